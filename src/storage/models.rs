use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or(())
    }
}

pub const COUNTRIES: [&str; 10] = [
    "Philippines",
    "USA",
    "Canada",
    "India",
    "Australia",
    "United Kingdom",
    "Germany",
    "Singapore",
    "Indonesia",
    "Thailand",
];

/// A row of the profile table, keyed by `email`.
///
/// `photo_url` is the object path inside the bucket, never a full URL.
/// Rows written elsewhere may lack the optional columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub account_name: String,
    pub email: String,
    pub contact_number: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// What the storage page renders for one profile.
#[derive(Debug, Serialize)]
pub struct ProfileCard {
    pub account_name: String,
    pub email: String,
    pub contact_number: String,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub photo_src: Option<String>,
}

impl ProfileCard {
    pub fn new(profile: Profile, public_base: &str) -> Self {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            photo_src: present(profile.photo_url).map(|path| public_url(public_base, &path)),
            gender: present(profile.gender),
            country: present(profile.country),
            account_name: profile.account_name,
            email: profile.email,
            contact_number: profile.contact_number,
        }
    }
}

pub fn public_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
