//! Default data for a fresh installation.

use department_selection_engine::GlobalLimit;

use crate::ADMIN_PASSWORD_KEY;

pub struct SeedCategory {
    pub name: &'static str,
    pub departments: &'static [&'static str],
}

pub static SETTINGS: &[(&str, &str)] = &[
    (GlobalLimit::SETTING_KEY, "3"),
    (ADMIN_PASSWORD_KEY, "admin123"),
];

pub static CATEGORIES: &[SeedCategory] = &[
    SeedCategory {
        name: "Music Ministry",
        departments: &["Choir", "Praise Team", "Sound & Media"],
    },
    SeedCategory {
        name: "Children's Ministry",
        departments: &["Sunday School Teachers", "Nursery"],
    },
    SeedCategory {
        name: "Outreach",
        departments: &["Evangelism Team", "Community Service"],
    },
];

pub static UNCATEGORIZED: &[&str] = &["Ushering", "Prayer Team", "Hospitality"];
