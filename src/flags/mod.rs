//! Waffle flags: server-controlled boolean toggles gating new authoring pages.
//!
//! The set of flags is fixed at compile time. A [`WaffleFlagSet`] stores one
//! value per flag in an array indexed by the enum, so a set can never be
//! missing a flag.

pub mod cache;

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

pub use cache::{FlagCache, FlagResolution};

macro_rules! waffle_flags {
    ($($variant:ident => $name:literal, $default:literal;)+) => {
        /// Every flag the authoring front-end knows about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum WaffleFlag {
            $($variant,)+
        }

        impl WaffleFlag {
            pub const ALL: &'static [WaffleFlag] = &[$(WaffleFlag::$variant,)+];

            /// Name used by the contentstore API.
            pub fn name(&self) -> &'static str {
                match self {
                    $(WaffleFlag::$variant => $name,)+
                }
            }

            /// Value used until the server says otherwise.
            pub fn default_value(&self) -> bool {
                match self {
                    $(WaffleFlag::$variant => $default,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(WaffleFlag::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

waffle_flags! {
    EnableCourseOptimizer => "enable_course_optimizer", false;
    EnableCourseOptimizerCheckPrevRunLinks => "enable_course_optimizer_check_prev_run_links", false;
    UseNewHomePage => "use_new_home_page", true;
    UseNewCustomPages => "use_new_custom_pages", true;
    UseNewScheduleDetailsPage => "use_new_schedule_details_page", true;
    UseNewAdvancedSettingsPage => "use_new_advanced_settings_page", true;
    UseNewGradingPage => "use_new_grading_page", true;
    UseNewUpdatesPage => "use_new_updates_page", true;
    UseNewImportPage => "use_new_import_page", true;
    UseNewExportPage => "use_new_export_page", true;
    UseNewFilesUploadsPage => "use_new_files_uploads_page", true;
    UseNewVideoUploadsPage => "use_new_video_uploads_page", false;
    UseNewCourseOutlinePage => "use_new_course_outline_page", true;
    UseNewUnitPage => "use_new_unit_page", false;
    UseNewCourseTeamPage => "use_new_course_team_page", true;
    UseNewCertificatesPage => "use_new_certificates_page", true;
    UseNewTextbooksPage => "use_new_textbooks_page", true;
    UseNewGroupConfigurationsPage => "use_new_group_configurations_page", true;
    UseReactMarkdownEditor => "use_react_markdown_editor", true;
    UseVideoGalleryFlow => "use_video_gallery_flow", false;
    EnableAuthzCourseAuthoring => "enable_authz_course_authoring", false;
}

impl WaffleFlag {
    pub const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for WaffleFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A complete flag table for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaffleFlagSet {
    /// `None` for global scope, otherwise a course id
    pub id: Option<String>,
    values: [bool; WaffleFlag::COUNT],
}

impl WaffleFlagSet {
    /// The static default table, tagged with `id`.
    pub fn defaults(id: Option<&str>) -> Self {
        let mut values = [false; WaffleFlag::COUNT];
        for flag in WaffleFlag::ALL {
            values[flag.index()] = flag.default_value();
        }
        Self {
            id: id.map(str::to_string),
            values,
        }
    }

    /// Build from a contentstore payload (`{ flag_name: bool, course_id?: string }`).
    ///
    /// Unknown names and non-boolean values are ignored; anything missing
    /// keeps its default.
    pub fn from_server(id: Option<&str>, body: &Value) -> Result<Self, String> {
        let Some(object) = body.as_object() else {
            return Err(format!("expected a JSON object, got {}", body));
        };

        let mut set = Self::defaults(id);
        for (name, value) in object {
            match (WaffleFlag::from_name(name), value.as_bool()) {
                (Some(flag), Some(enabled)) => set.values[flag.index()] = enabled,
                (None, _) if name == "course_id" => {}
                (None, _) => log::debug!("Ignoring unknown waffle flag {}", name),
                (Some(flag), None) => log::warn!("Waffle flag {} is not a boolean: {}", flag, value),
            }
        }
        Ok(set)
    }

    pub fn get(&self, flag: WaffleFlag) -> bool {
        self.values[flag.index()]
    }

    pub fn set(&mut self, flag: WaffleFlag, enabled: bool) {
        self.values[flag.index()] = enabled;
    }

    /// Same values under a different scope id.
    pub fn with_id(&self, id: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string),
            values: self.values,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (WaffleFlag, bool)> + '_ {
        WaffleFlag::ALL.iter().map(|flag| (*flag, self.get(*flag)))
    }
}

impl Serialize for WaffleFlagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(WaffleFlag::COUNT + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (flag, enabled) in self.iter() {
            map.serialize_entry(flag.name(), &enabled)?;
        }
        map.end()
    }
}
