use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    Wav,
    Mp3,
    Id3TaggedMp3,
}

impl AudioContainer {
    /// Matches the leading bytes of a recording against known signatures.
    pub fn sniff(header: &[u8]) -> Option<AudioContainer> {
        match header {
            [0x52, 0x49, 0x46, 0x46, ..] => Some(AudioContainer::Wav),
            [0x49, 0x44, 0x33, ..] => Some(AudioContainer::Id3TaggedMp3),
            // 11-bit MPEG audio frame sync
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Some(AudioContainer::Mp3),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioContainer::Wav => "wav",
            AudioContainer::Mp3 | AudioContainer::Id3TaggedMp3 => "mp3",
        }
    }
}

impl Display for AudioContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let container = match self {
            AudioContainer::Wav => "wav",
            AudioContainer::Mp3 => "mp3",
            AudioContainer::Id3TaggedMp3 => "id3",
        };
        write!(f, "{}", container)
    }
}

/// Non-fatal finding: the header matched no known signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationAdvisory {
    pub header_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub size_bytes: usize,
    pub container: Option<AudioContainer>,
    pub advisory: Option<ValidationAdvisory>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.advisory.is_none()
    }
}
