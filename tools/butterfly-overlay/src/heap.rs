//! 4-ary min-heap over dense vertex ids
//!
//! `index[v]` is either a heap position (frontier), `UNVISITED` or `SETTLED`,
//! so membership and color lookups are a single array read. Storage survives
//! `reset`, so a heap kept per worker allocates only on the first query.

/// Children per node
pub const ARITY: usize = 4;

const UNVISITED: u32 = u32::MAX;
const SETTLED: u32 = u32::MAX - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Unvisited,
    Frontier,
    Settled,
}

/// (priority, vertex) packed into one 8-byte slot
#[derive(Debug, Clone, Copy)]
#[repr(C, align(8))]
struct Item {
    priority: f32,
    vertex: u32,
}

#[derive(Debug, Default)]
pub struct Heap {
    items: Vec<Item>,
    index: Vec<u32>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_count: usize) -> Self {
        let mut heap = Self {
            items: Vec::with_capacity(vertex_count.min(1 << 16)),
            index: Vec::new(),
        };
        heap.reset(vertex_count);
        heap
    }

    /// Forget all vertices and size the index array for `vertex_count` ids
    pub fn reset(&mut self, vertex_count: usize) {
        assert!(
            vertex_count < SETTLED as usize,
            "vertex count {} exceeds heap index space",
            vertex_count
        );
        self.items.clear();
        self.index.clear();
        self.index.resize(vertex_count, UNVISITED);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of vertex ids the heap was reset for
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn color(&self, v: u32) -> Color {
        match self.index[v as usize] {
            UNVISITED => Color::Unvisited,
            SETTLED => Color::Settled,
            _ => Color::Frontier,
        }
    }

    /// Current priority of a frontier vertex
    pub fn priority(&self, v: u32) -> Option<f32> {
        match self.index[v as usize] {
            UNVISITED | SETTLED => None,
            pos => Some(self.items[pos as usize].priority),
        }
    }

    pub fn min_priority(&self) -> Option<f32> {
        self.items.first().map(|item| item.priority)
    }

    /// Insert an unvisited vertex
    pub fn push(&mut self, v: u32, priority: f32) {
        assert!(!priority.is_nan(), "NaN priority for vertex {}", v);
        assert_eq!(
            self.index[v as usize],
            UNVISITED,
            "push of vertex {} which is not unvisited",
            v
        );
        let pos = self.items.len();
        self.items.push(Item { priority, vertex: v });
        self.index[v as usize] = pos as u32;
        self.sift_up(pos);
    }

    /// Lower the priority of a frontier vertex; returns whether it improved
    pub fn update(&mut self, v: u32, priority: f32) -> bool {
        let pos = self.index[v as usize];
        assert!(
            pos != UNVISITED && pos != SETTLED,
            "update of vertex {} which is not in the frontier",
            v
        );
        assert!(!priority.is_nan(), "NaN priority for vertex {}", v);
        let pos = pos as usize;
        if priority >= self.items[pos].priority {
            return false;
        }
        self.items[pos].priority = priority;
        self.sift_up(pos);
        true
    }

    /// Remove the minimum and mark it settled
    pub fn pop(&mut self) -> Option<(u32, f32)> {
        let top = *self.items.first()?;
        let last = self.items.pop()?;
        if !self.items.is_empty() {
            self.items[0] = last;
            self.index[last.vertex as usize] = 0;
            self.sift_down(0);
        }
        self.index[top.vertex as usize] = SETTLED;
        Some((top.vertex, top.priority))
    }

    fn sift_up(&mut self, mut pos: usize) {
        let item = self.items[pos];
        while pos > 0 {
            let parent = (pos - 1) / ARITY;
            if self.items[parent].priority <= item.priority {
                break;
            }
            self.items[pos] = self.items[parent];
            self.index[self.items[pos].vertex as usize] = pos as u32;
            pos = parent;
        }
        self.items[pos] = item;
        self.index[item.vertex as usize] = pos as u32;
    }

    fn sift_down(&mut self, mut pos: usize) {
        let item = self.items[pos];
        let len = self.items.len();
        loop {
            let first = pos * ARITY + 1;
            if first >= len {
                break;
            }
            let end = (first + ARITY).min(len);
            let mut child = first;
            for c in first + 1..end {
                if self.items[c].priority < self.items[child].priority {
                    child = c;
                }
            }
            if self.items[child].priority >= item.priority {
                break;
            }
            self.items[pos] = self.items[child];
            self.index[self.items[pos].vertex as usize] = pos as u32;
            pos = child;
        }
        self.items[pos] = item;
        self.index[item.vertex as usize] = pos as u32;
    }
}
