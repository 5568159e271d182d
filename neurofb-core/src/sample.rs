/// One pulled multi-channel sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub values: Vec<f32>,
    /// Acquisition timestamp in seconds on the transport clock.
    pub timestamp: f64,
}

impl Sample {
    pub fn new(values: Vec<f32>, timestamp: f64) -> Self {
        Self { values, timestamp }
    }

    pub fn channel_count(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, channel: usize) -> Option<f32> {
        self.values.get(channel).copied()
    }
}
