//! UI layout preferences and feature toggles

use super::element::XmlElement;
use super::background::BackgroundImage;
use super::tags;
use crate::processor::{MAX_MAPPING_ID, MIN_MAPPING_ID};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const MIN_ROW_HEIGHT: u32 = 20;
pub const MAX_ROW_HEIGHT: u32 = 80;
pub const DEFAULT_ROW_HEIGHT: u32 = 33;
pub const DEFAULT_SPLIT_RATIO: f32 = 0.5;

/// Top-level page shown in the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiPage {
    #[default]
    SoundobjectTable,
    MultiSlider,
    Scenes,
    EnSpace,
    Statistics,
    Settings,
    About,
}

impl UiPage {
    pub const ALL: [UiPage; 7] = [
        UiPage::SoundobjectTable,
        UiPage::MultiSlider,
        UiPage::Scenes,
        UiPage::EnSpace,
        UiPage::Statistics,
        UiPage::Settings,
        UiPage::About,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UiPage::SoundobjectTable => "soundobject-table",
            UiPage::MultiSlider => "multislider",
            UiPage::Scenes => "scenes",
            UiPage::EnSpace => "en-space",
            UiPage::Statistics => "statistics",
            UiPage::Settings => "settings",
            UiPage::About => "about",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|page| page.as_str() == s)
    }
}

/// Colour scheme selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookAndFeel {
    #[default]
    Dark,
    Light,
    FollowHost,
}

impl LookAndFeel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookAndFeel::Dark => "dark",
            LookAndFeel::Light => "light",
            LookAndFeel::FollowHost => "follow-host",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dark" => Some(LookAndFeel::Dark),
            "light" => Some(LookAndFeel::Light),
            "follow-host" => Some(LookAndFeel::FollowHost),
            _ => None,
        }
    }
}

/// Optional features the user can switch on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureToggles {
    pub look_and_feel: LookAndFeel,
    pub fullscreen_window: bool,
    pub multislider_show_spread: bool,
    pub multislider_show_reverb_send_gain: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            look_and_feel: LookAndFeel::Dark,
            fullscreen_window: false,
            multislider_show_spread: true,
            multislider_show_reverb_send_gain: false,
        }
    }
}

/// Scene recall index as shown by the remote device ("major.minor")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SceneIndex {
    pub major: u16,
    pub minor: u16,
}

impl SceneIndex {
    pub fn parse(s: &str) -> Option<Self> {
        let (major, minor) = s.trim().split_once('.')?;
        Some(Self {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }
}

impl std::fmt::Display for SceneIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// A scene pinned to the quick-access list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedScene {
    pub index: SceneIndex,
    pub name: String,
}

/// Persisted editor layout and preferences
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    active_page: UiPage,
    table_row_height: u32,
    table_split_ratio: f32,
    table_collapsed: bool,
    multislider_collapsed: bool,
    pinned_scenes: Vec<PinnedScene>,
    background_images: BTreeMap<u8, BackgroundImage>,
    toggles: FeatureToggles,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_page: UiPage::default(),
            table_row_height: DEFAULT_ROW_HEIGHT,
            table_split_ratio: DEFAULT_SPLIT_RATIO,
            table_collapsed: false,
            multislider_collapsed: false,
            pinned_scenes: Vec::new(),
            background_images: BTreeMap::new(),
            toggles: FeatureToggles::default(),
        }
    }
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_page(&self) -> UiPage {
        self.active_page
    }

    pub fn set_active_page(&mut self, page: UiPage) {
        self.active_page = page;
    }

    pub fn table_row_height(&self) -> u32 {
        self.table_row_height
    }

    /// Row height in pixels, clamped to the supported range
    pub fn set_table_row_height(&mut self, height: u32) {
        self.table_row_height = height.clamp(MIN_ROW_HEIGHT, MAX_ROW_HEIGHT);
    }

    pub fn table_split_ratio(&self) -> f32 {
        self.table_split_ratio
    }

    /// Share of the editor height given to the table (0.0-1.0)
    pub fn set_table_split_ratio(&mut self, ratio: f32) {
        self.table_split_ratio = if ratio.is_nan() {
            DEFAULT_SPLIT_RATIO
        } else {
            ratio.clamp(0.0, 1.0)
        };
    }

    pub fn table_collapsed(&self) -> bool {
        self.table_collapsed
    }

    pub fn set_table_collapsed(&mut self, collapsed: bool) {
        self.table_collapsed = collapsed;
    }

    pub fn multislider_collapsed(&self) -> bool {
        self.multislider_collapsed
    }

    pub fn set_multislider_collapsed(&mut self, collapsed: bool) {
        self.multislider_collapsed = collapsed;
    }

    pub fn pinned_scenes(&self) -> &[PinnedScene] {
        &self.pinned_scenes
    }

    /// Pin a scene; re-pinning an index updates its name in place
    pub fn pin_scene(&mut self, index: SceneIndex, name: impl Into<String>) {
        let name = name.into();
        match self.pinned_scenes.iter_mut().find(|s| s.index == index) {
            Some(existing) => existing.name = name,
            None => self.pinned_scenes.push(PinnedScene { index, name }),
        }
    }

    pub fn unpin_scene(&mut self, index: &SceneIndex) -> bool {
        let before = self.pinned_scenes.len();
        self.pinned_scenes.retain(|s| &s.index != index);
        self.pinned_scenes.len() != before
    }

    pub fn background_image(&self, mapping_id: u8) -> Option<&BackgroundImage> {
        self.background_images.get(&mapping_id)
    }

    /// Set or clear the image of a mapping area
    ///
    /// Returns `false` and changes nothing for ids outside the mapping areas.
    pub fn set_background_image(&mut self, mapping_id: u8, image: Option<BackgroundImage>) -> bool {
        if !is_mapping_area(mapping_id) {
            warn!("Ignoring background image for unknown mapping area {}", mapping_id);
            return false;
        }
        match image {
            Some(image) => {
                self.background_images.insert(mapping_id, image);
            }
            None => {
                self.background_images.remove(&mapping_id);
            }
        }
        true
    }

    pub fn toggles(&self) -> &FeatureToggles {
        &self.toggles
    }

    pub fn toggles_mut(&mut self) -> &mut FeatureToggles {
        &mut self.toggles
    }

    pub fn create_state_xml(&self) -> XmlElement {
        let mut root = XmlElement::new(tags::UI_CONFIG)
            .with_attribute(tags::ACTIVE_PAGE, self.active_page.as_str());

        root.add_child(
            XmlElement::new(tags::TABLE_LAYOUT)
                .with_attribute(tags::ROW_HEIGHT, self.table_row_height)
                .with_attribute(tags::SPLIT_RATIO, self.table_split_ratio)
                .with_attribute(tags::TABLE_COLLAPSED, self.table_collapsed)
                .with_attribute(tags::MULTISLIDER_COLLAPSED, self.multislider_collapsed),
        );

        let mut scenes = XmlElement::new(tags::PINNED_SCENES);
        for scene in &self.pinned_scenes {
            scenes.add_child(
                XmlElement::new(tags::SCENE)
                    .with_attribute(tags::INDEX, &scene.index)
                    .with_attribute(tags::NAME, &scene.name),
            );
        }
        root.add_child(scenes);

        let mut images = XmlElement::new(tags::BACKGROUND_IMAGES);
        for (mapping_id, image) in &self.background_images {
            let mut element = XmlElement::new(tags::IMAGE).with_attribute(tags::MAPPING, mapping_id);
            element.set_text(image.to_base64());
            images.add_child(element);
        }
        root.add_child(images);

        root.add_child(
            XmlElement::new(tags::TOGGLES)
                .with_attribute(tags::LOOK_AND_FEEL, self.toggles.look_and_feel.as_str())
                .with_attribute(tags::FULLSCREEN, self.toggles.fullscreen_window)
                .with_attribute(tags::SHOW_SPREAD, self.toggles.multislider_show_spread)
                .with_attribute(
                    tags::SHOW_REVERB_SEND_GAIN,
                    self.toggles.multislider_show_reverb_send_gain,
                ),
        );

        root
    }

    /// Restore from an element created by [`create_state_xml`](Self::create_state_xml)
    ///
    /// A wrong tag leaves the state untouched. Missing or invalid pieces keep
    /// their current value (invalid enumerations fall back to a default) and
    /// make the call return `false`; everything valid is still applied.
    pub fn set_state_xml(&mut self, element: &XmlElement) -> bool {
        if !element.has_tag(tags::UI_CONFIG) {
            debug!("Ignoring UI state element <{}>", element.tag());
            return false;
        }

        let mut ok = true;

        match element.attribute(tags::ACTIVE_PAGE).map(UiPage::parse) {
            Some(Some(page)) => self.active_page = page,
            Some(None) => {
                warn!("Invalid active page in UI state, using default page");
                self.active_page = UiPage::default();
                ok = false;
            }
            None => ok = false,
        }

        match element.child(tags::TABLE_LAYOUT) {
            Some(layout) => {
                match layout.int_attribute(tags::ROW_HEIGHT) {
                    Some(height) => {
                        self.set_table_row_height(height.clamp(0, u32::MAX as i64) as u32)
                    }
                    None => ok = false,
                }
                match layout.double_attribute(tags::SPLIT_RATIO) {
                    Some(ratio) => self.set_table_split_ratio(ratio as f32),
                    None => ok = false,
                }
                match layout.bool_attribute(tags::TABLE_COLLAPSED) {
                    Some(collapsed) => self.table_collapsed = collapsed,
                    None => ok = false,
                }
                match layout.bool_attribute(tags::MULTISLIDER_COLLAPSED) {
                    Some(collapsed) => self.multislider_collapsed = collapsed,
                    None => ok = false,
                }
            }
            None => ok = false,
        }

        match element.child(tags::PINNED_SCENES) {
            Some(scenes) => {
                let mut pinned = Vec::new();
                for scene in scenes.children_named(tags::SCENE) {
                    match scene.attribute(tags::INDEX).and_then(SceneIndex::parse) {
                        Some(index) => pinned.push(PinnedScene {
                            index,
                            name: scene.attribute(tags::NAME).unwrap_or_default().to_string(),
                        }),
                        None => {
                            warn!("Skipping pinned scene with invalid index");
                            ok = false;
                        }
                    }
                }
                self.pinned_scenes = pinned;
            }
            None => ok = false,
        }

        match element.child(tags::BACKGROUND_IMAGES) {
            Some(images) => {
                let mut restored = BTreeMap::new();
                for image in images.children_named(tags::IMAGE) {
                    let mapping = image
                        .int_attribute(tags::MAPPING)
                        .and_then(|m| u8::try_from(m).ok())
                        .filter(|m| is_mapping_area(*m));
                    match (mapping, BackgroundImage::from_base64(image.text())) {
                        (Some(mapping), Ok(decoded)) => {
                            restored.insert(mapping, decoded);
                        }
                        (_, Err(e)) => {
                            warn!("Skipping undecodable background image: {}", e);
                            ok = false;
                        }
                        (None, Ok(_)) => {
                            warn!("Skipping background image without a valid mapping area");
                            ok = false;
                        }
                    }
                }
                self.background_images = restored;
            }
            None => ok = false,
        }

        match element.child(tags::TOGGLES) {
            Some(toggles) => {
                match toggles
                    .attribute(tags::LOOK_AND_FEEL)
                    .map(LookAndFeel::parse)
                {
                    Some(Some(laf)) => self.toggles.look_and_feel = laf,
                    Some(None) => {
                        self.toggles.look_and_feel = LookAndFeel::default();
                        ok = false;
                    }
                    None => ok = false,
                }
                for (key, slot) in [
                    (tags::FULLSCREEN, &mut self.toggles.fullscreen_window),
                    (tags::SHOW_SPREAD, &mut self.toggles.multislider_show_spread),
                    (
                        tags::SHOW_REVERB_SEND_GAIN,
                        &mut self.toggles.multislider_show_reverb_send_gain,
                    ),
                ] {
                    match toggles.bool_attribute(key) {
                        Some(value) => *slot = value,
                        None => ok = false,
                    }
                }
            }
            None => ok = false,
        }

        ok
    }
}

fn is_mapping_area(mapping_id: u8) -> bool {
    (MIN_MAPPING_ID..=MAX_MAPPING_ID).contains(&mapping_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_xml::background::test_image;

    fn populated_state() -> UiState {
        let mut state = UiState::new();
        state.set_active_page(UiPage::Scenes);
        state.set_table_row_height(40);
        state.set_table_split_ratio(0.75);
        state.set_table_collapsed(true);
        state.pin_scene(SceneIndex { major: 2, minor: 1 }, "Act 2");
        state.pin_scene(SceneIndex { major: 10, minor: 0 }, "Finale");
        assert!(state.set_background_image(
            3,
            Some(BackgroundImage::from_image(&test_image(2, 2)).unwrap()),
        ));
        state.toggles_mut().look_and_feel = LookAndFeel::Light;
        state.toggles_mut().fullscreen_window = true;
        state
    }

    #[test]
    fn test_roundtrip_through_document() {
        let state = populated_state();
        let doc = state.create_state_xml().to_document().unwrap();

        let mut restored = UiState::new();
        assert!(restored.set_state_xml(&XmlElement::parse(&doc).unwrap()));
        assert_eq!(restored, state);
    }

    #[test]
    fn test_row_height_clamped() {
        let mut state = UiState::new();
        state.set_table_row_height(5);
        assert_eq!(state.table_row_height(), MIN_ROW_HEIGHT);
        state.set_table_row_height(500);
        assert_eq!(state.table_row_height(), MAX_ROW_HEIGHT);
    }

    #[test]
    fn test_wrong_tag_leaves_state_untouched() {
        let mut state = populated_state();
        let before = state.clone();

        let mut element = state.create_state_xml();
        element = XmlElement::new("SomethingElse").with_child(element);

        assert!(!state.set_state_xml(&element));
        assert_eq!(state, before);
    }

    #[test]
    fn test_invalid_page_falls_back_and_reports_failure() {
        let mut state = populated_state();
        let mut element = state.create_state_xml();
        element.set_attribute(tags::ACTIVE_PAGE, "no-such-page");

        assert!(!state.set_state_xml(&element));
        assert_eq!(state.active_page(), UiPage::SoundobjectTable);
        // Valid parts are still applied
        assert_eq!(state.table_row_height(), 40);
    }

    #[test]
    fn test_missing_children_keep_defaults() {
        let mut state = UiState::new();
        let element = XmlElement::new(tags::UI_CONFIG).with_attribute(tags::ACTIVE_PAGE, "about");

        assert!(!state.set_state_xml(&element));
        assert_eq!(state.active_page(), UiPage::About);
        assert_eq!(state.table_row_height(), DEFAULT_ROW_HEIGHT);
        assert!(state.toggles().multislider_show_spread);
    }

    #[test]
    fn test_background_image_outside_mapping_areas() {
        let image = BackgroundImage::from_image(&test_image(1, 1)).unwrap();

        let mut state = UiState::new();
        assert!(!state.set_background_image(0, Some(image.clone())));
        assert!(!state.set_background_image(MAX_MAPPING_ID + 1, Some(image.clone())));
        assert!(state.background_image(0).is_none());

        // Restore skips the stray image but keeps the valid one
        let mut element = populated_state().create_state_xml();
        let images = element.child_mut(tags::BACKGROUND_IMAGES).unwrap();
        let mut stray = XmlElement::new(tags::IMAGE).with_attribute(tags::MAPPING, 9);
        stray.set_text(image.to_base64());
        images.add_child(stray);

        assert!(!state.set_state_xml(&element));
        assert!(state.background_image(3).is_some());
        assert!(state.background_image(9).is_none());
    }

    #[test]
    fn test_page_and_look_and_feel_names() {
        for page in UiPage::ALL {
            assert_eq!(UiPage::parse(page.as_str()), Some(page));
        }
        assert_eq!(UiPage::parse("nowhere"), None);
        assert_eq!(LookAndFeel::parse("follow-host"), Some(LookAndFeel::FollowHost));
        assert_eq!(LookAndFeel::parse("Dark"), None);
    }

    #[test]
    fn test_pin_and_unpin_scene() {
        let mut state = UiState::new();
        let index = SceneIndex::parse("1.05").unwrap();
        state.pin_scene(index.clone(), "Intro");
        state.pin_scene(index.clone(), "Intro (new)");

        assert_eq!(state.pinned_scenes().len(), 1);
        assert_eq!(state.pinned_scenes()[0].name, "Intro (new)");
        assert_eq!(state.pinned_scenes()[0].index.to_string(), "1.05");

        assert!(state.unpin_scene(&index));
        assert!(!state.unpin_scene(&index));
    }
}
