use echohub_schema::Echo;

/// Ordered, append-only sequence of emitted echoes.
#[derive(Debug, Default)]
pub struct GlobalFeed {
    items: Vec<Echo>,
}

impl GlobalFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, batch: &[Echo]) {
        self.items.extend_from_slice(batch);
    }

    pub fn items(&self) -> &[Echo] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
