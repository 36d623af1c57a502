//! Static channel catalog

use crate::models::{ChannelConfig, ChannelSummary, LocalizedName};

/// Base URL of the RTHK radio pages
pub const RTHK_RADIO_BASE_URL: &str = "https://www.rthk.hk/radio";

/// Known RTHK live channels: (id, english name, chinese name, fallback HLS stream)
const RTHK_CHANNELS: &[(&str, &str, &str, &str)] = &[
    (
        "radio1",
        "RTHK Radio 1",
        "RTHK 第一台",
        "https://rthkaudio1-lh.akamaihd.net/i/radio1_1@355864/master.m3u8",
    ),
    (
        "radio2",
        "RTHK Radio 2",
        "RTHK 第二台",
        "https://rthkaudio2-lh.akamaihd.net/i/radio2_1@355865/master.m3u8",
    ),
    (
        "radio3",
        "RTHK Radio 3",
        "RTHK 第三台",
        "https://rthkaudio3-lh.akamaihd.net/i/radio3_1@355866/master.m3u8",
    ),
    (
        "radio4",
        "RTHK Radio 4",
        "RTHK 第四台",
        "https://rthkaudio4-lh.akamaihd.net/i/radio4_1@355867/master.m3u8",
    ),
    (
        "radio5",
        "RTHK Radio 5",
        "RTHK 第五台",
        "https://rthkaudio5-lh.akamaihd.net/i/radio5_1@355868/master.m3u8",
    ),
];

/// Ordered, immutable list of channels
#[derive(Debug, Clone, Default)]
pub struct ChannelCatalog {
    channels: Vec<ChannelConfig>,
}

impl ChannelCatalog {
    pub fn new(channels: Vec<ChannelConfig>) -> Self {
        Self { channels }
    }

    /// RTHK Radio 1 to 5
    pub fn rthk_default() -> Self {
        Self::new(
            RTHK_CHANNELS
                .iter()
                .map(|(id, en, zh, fallback)| {
                    ChannelConfig::new(
                        *id,
                        LocalizedName::new(*en, *zh),
                        format!("{}/{}", RTHK_RADIO_BASE_URL, id),
                    )
                    .with_fallback(*fallback)
                })
                .collect(),
        )
    }

    pub fn get(&self, id: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|channel| channel.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelConfig> {
        self.channels.iter()
    }

    pub fn summaries(&self) -> Vec<ChannelSummary> {
        self.channels.iter().map(ChannelConfig::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
