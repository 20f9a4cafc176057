//! Acquisition channel descriptors.

use serde::{Deserialize, Serialize};

fn default_conversion() -> f32 {
    1e6
}

fn default_sampling_rate() -> f32 {
    30_000.0
}

fn default_bit_volts() -> f32 {
    0.05
}

fn default_comments() -> String {
    "no comments".to_string()
}

/// One recorded electrode channel.
///
/// `conversion` maps microvolts to volts and `bit_volts` is the microvolt value of
/// one least-significant bit, so raw 16-bit samples scale to volts by
/// [`Channel::effective_conversion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    /// Electrode group this channel belongs to.
    pub group_name: String,
    /// Index within the group.
    pub local_index: usize,
    /// Index across all channels; used as the electrode number.
    pub global_index: usize,
    #[serde(default = "default_conversion")]
    pub conversion: f32,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f32,
    #[serde(default = "default_bit_volts")]
    pub bit_volts: f32,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "default_comments")]
    pub comments: String,
}

impl Channel {
    /// A channel with the default scaling and sampling rate.
    pub fn new(
        name: impl Into<String>,
        group_name: impl Into<String>,
        local_index: usize,
        global_index: usize,
    ) -> Self {
        Self {
            name: name.into(),
            group_name: group_name.into(),
            local_index,
            global_index,
            conversion: default_conversion(),
            sampling_rate: default_sampling_rate(),
            bit_volts: default_bit_volts(),
            position: [0.0; 3],
            comments: default_comments(),
        }
    }

    /// Volts per raw sample unit.
    pub fn effective_conversion(&self) -> f32 {
        self.bit_volts / self.conversion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_conversion() {
        let channel = Channel::new("ch0", "array0", 0, 4);
        assert_eq!(channel.sampling_rate, 30_000.0);
        assert_eq!(channel.comments, "no comments");
        assert!((channel.effective_conversion() - 5e-8).abs() < 1e-12);
    }

    #[test]
    fn deserializes_with_defaults() {
        let channel: Channel = toml::from_str(
            r#"
            name = "ch1"
            group_name = "shank1"
            local_index = 1
            global_index = 9
            position = [1.0, 2.0, 0.5]
            "#,
        )
        .unwrap();
        assert_eq!(channel.global_index, 9);
        assert_eq!(channel.position, [1.0, 2.0, 0.5]);
        assert_eq!(channel.bit_volts, 0.05);
    }
}
