//! Queue configuration used when a producer allocates a new descriptor

/// Default ring size in bytes (4KB)
const DEFAULT_BUFFER_SIZE: usize = 4 * 1024;

/// Default element size in bytes
const DEFAULT_MESSAGE_SIZE: u32 = 8;

const DEFAULT_REGION_NAME: &str = "mq_descriptor";

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Size of the data ring in bytes, a multiple of `message_size`
    pub buffer_size: usize,
    /// Size of one element in bytes
    pub message_size: u32,
    /// Reserve a wake word for blocking operations
    pub wake_word: bool,
    /// Debug name of the backing region
    pub region_name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            message_size: DEFAULT_MESSAGE_SIZE,
            wake_word: false,
            region_name: DEFAULT_REGION_NAME.to_string(),
        }
    }
}

impl QueueConfig {
    /// Ring holding `elements` messages of `message_size` bytes
    pub fn with_capacity(elements: usize, message_size: u32) -> Self {
        Self {
            buffer_size: elements.saturating_mul(message_size as usize),
            message_size,
            ..Self::default()
        }
    }

    pub fn with_wake_word(mut self, wake_word: bool) -> Self {
        self.wake_word = wake_word;
        self
    }

    pub fn with_region_name(mut self, name: impl Into<String>) -> Self {
        self.region_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_whole_elements() {
        let config = QueueConfig::default();
        assert_eq!(config.buffer_size % config.message_size as usize, 0);
        assert!(!config.wake_word);
    }

    #[test]
    fn test_builders() {
        let config = QueueConfig::with_capacity(16, 4)
            .with_wake_word(true)
            .with_region_name("sensor_ring");
        assert_eq!(config.buffer_size, 64);
        assert_eq!(config.message_size, 4);
        assert!(config.wake_word);
        assert_eq!(config.region_name, "sensor_ring");
    }
}
