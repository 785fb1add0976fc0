//! Persisted state as an XML document
//!
//! The state document holds processor identities and parameter values, the
//! editor layout and feature toggles. Components build their own subtree with
//! `create_state_xml()` and restore it with `set_state_xml()`.

mod element;
pub mod background;
pub mod ui;

pub use element::XmlElement;
pub use background::BackgroundImage;
pub use ui::{FeatureToggles, LookAndFeel, PinnedScene, SceneIndex, UiPage, UiState};

use crate::error::{Result, SurfaceError};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Element and attribute names used in the state document
pub mod tags {
    pub const ROOT: &str = "SoundscapeSurface";
    pub const VERSION: &str = "version";

    pub const PROCESSORS: &str = "Processors";
    pub const PROCESSOR: &str = "Processor";
    pub const PROCESSOR_ID: &str = "id";
    pub const IDENTITY: &str = "Identity";
    pub const SOUNDOBJECT_ID: &str = "soundobject";
    pub const MAPPING_ID: &str = "mapping";
    pub const COMS_MODE: &str = "comsMode";
    pub const COLOUR: &str = "colour";
    pub const SIZE: &str = "size";
    pub const PARAMETERS: &str = "Parameters";

    pub const UI_CONFIG: &str = "UiConfig";
    pub const ACTIVE_PAGE: &str = "activePage";
    pub const TABLE_LAYOUT: &str = "TableLayout";
    pub const ROW_HEIGHT: &str = "rowHeight";
    pub const SPLIT_RATIO: &str = "splitRatio";
    pub const TABLE_COLLAPSED: &str = "tableCollapsed";
    pub const MULTISLIDER_COLLAPSED: &str = "multisliderCollapsed";
    pub const PINNED_SCENES: &str = "PinnedScenes";
    pub const SCENE: &str = "Scene";
    pub const INDEX: &str = "index";
    pub const NAME: &str = "name";
    pub const BACKGROUND_IMAGES: &str = "BackgroundImages";
    pub const IMAGE: &str = "Image";
    pub const MAPPING: &str = "mapping";
    pub const TOGGLES: &str = "Toggles";
    pub const LOOK_AND_FEEL: &str = "lookAndFeel";
    pub const FULLSCREEN: &str = "fullscreenWindow";
    pub const SHOW_SPREAD: &str = "multisliderShowSpread";
    pub const SHOW_REVERB_SEND_GAIN: &str = "multisliderShowReverbSendGain";
}

/// Current state document format version
pub const STATE_VERSION: i64 = 1;

/// Read and parse a state document, checking the root element
pub async fn load_state_file(path: impl AsRef<Path>) -> Result<XmlElement> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).await?;
    let root = XmlElement::parse(&text)?;

    if !root.has_tag(tags::ROOT) {
        return Err(SurfaceError::UnexpectedRoot {
            expected: tags::ROOT.to_string(),
            found: root.tag().to_string(),
        });
    }

    debug!(
        "State document loaded from {} (version {:?})",
        path.display(),
        root.int_attribute(tags::VERSION)
    );
    Ok(root)
}

/// Write a state document, creating the parent directory if needed
pub async fn save_state_file(path: impl AsRef<Path>, root: &XmlElement) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(path, root.to_document()?).await?;
    debug!("State document saved to {}", path.display());
    Ok(())
}
