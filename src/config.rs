/// Configuration for a single [`Partition`](crate::partition::Partition).
///
/// The `streaming` crate this is modeled on keeps its own per-component
/// config structs free of the `server` binary's `figment`/`toml` layering;
/// this crate follows the same split and exposes a plain `Default` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionConfig {
    /// Number of messages a segment holds before it is sealed and a new
    /// active segment is opened.
    pub messages_per_file: u32,
}

pub(crate) const DEFAULT_MESSAGES_PER_FILE: u32 = 10_000;

impl Default for PartitionConfig {
    fn default() -> Self {
        PartitionConfig {
            messages_per_file: DEFAULT_MESSAGES_PER_FILE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_messages_per_file_is_ten_thousand() {
        assert_eq!(PartitionConfig::default().messages_per_file, 10_000);
    }
}
