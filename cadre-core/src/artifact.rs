use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Audio,
    Binary,
}

impl ArtifactKind {
    pub fn stem(self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Audio => "audio",
            ArtifactKind::Binary => "artifact",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Image => "png",
            ArtifactKind::Audio => "mp3",
            ArtifactKind::Binary => "bin",
        }
    }
}

/// Non-text payload produced by a tool. Agents keep these in scratch state and
/// hand the model a reference label instead of the bytes.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, data: Vec<u8>) -> Self {
        Self {
            kind,
            mime_type: None,
            data,
        }
    }

    pub fn image(data: Vec<u8>) -> Self {
        Self::new(ArtifactKind::Image, data).with_mime_type("image/png")
    }

    pub fn audio(data: Vec<u8>) -> Self {
        Self::new(ArtifactKind::Audio, data).with_mime_type("audio/mpeg")
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
