//! Skill catalog
//!
//! A skill is a block of tool documentation (SKILL.md) that is injected into
//! the prompt only when the router decides the request needs it. Each file
//! carries YAML-style frontmatter with a `name` and a one-line
//! `description`, followed by the markdown body.
//!
//! The catalog is built once at startup from the bundled skills plus an
//! optional directory of `<id>/SKILL.md` overrides, and never changes after.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

static FRONTMATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^---\r?\n(.*?)\r?\n---\r?\n?").expect("valid regex"));

const BUNDLED: &[(&str, &str)] = &[
    ("gmail", include_str!("../skills/gmail/SKILL.md")),
    ("calendar", include_str!("../skills/calendar/SKILL.md")),
    ("sheets", include_str!("../skills/sheets/SKILL.md")),
    ("docs", include_str!("../skills/docs/SKILL.md")),
    (
        "knowledge-base",
        include_str!("../skills/knowledge-base/SKILL.md"),
    ),
    ("browser", include_str!("../skills/browser/SKILL.md")),
    ("shell", include_str!("../skills/shell/SKILL.md")),
];

/// One unit of injectable tool documentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skill {
    pub id: String,
    pub description: String,
    #[serde(skip)]
    pub body: String,
}

impl Skill {
    /// Parse a SKILL.md document. The frontmatter `name` wins over `fallback_id`.
    pub fn parse(fallback_id: &str, content: &str) -> Self {
        let mut id = fallback_id.to_string();
        let mut description = String::new();

        let body = match FRONTMATTER.captures(content) {
            Some(caps) => {
                for line in caps.get(1).map(|m| m.as_str()).unwrap_or("").lines() {
                    if let Some((key, value)) = line.split_once(':') {
                        let value = value.trim().trim_matches('"').trim_matches('\'');
                        match key.trim() {
                            "name" if !value.is_empty() => id = value.to_string(),
                            "description" => description = value.to_string(),
                            _ => {}
                        }
                    }
                }
                caps.get(0)
                    .map(|m| &content[m.end()..])
                    .unwrap_or(content)
            }
            None => content,
        };

        let body = body.trim().to_string();
        if description.is_empty() {
            description = body
                .lines()
                .map(|l| l.trim_start_matches('#').trim())
                .find(|l| !l.is_empty())
                .unwrap_or(id.as_str())
                .to_string();
        }

        Self {
            id,
            description,
            body,
        }
    }
}

/// Immutable, ordered set of skills
#[derive(Debug, Clone, Default)]
pub struct SkillCatalog {
    skills: Vec<Skill>,
}

impl SkillCatalog {
    pub fn new(skills: Vec<Skill>) -> Self {
        let mut catalog = Self::default();
        for skill in skills {
            catalog.insert(skill);
        }
        catalog
    }

    /// The skills shipped with toolpilot
    pub fn bundled() -> Self {
        Self::new(
            BUNDLED
                .iter()
                .map(|(id, content)| Skill::parse(id, content))
                .collect(),
        )
    }

    /// Bundled skills overlaid with `<dir>/<id>/SKILL.md` files
    pub fn load(skills_dir: Option<&Path>) -> Self {
        let mut catalog = Self::bundled();
        if let Some(dir) = skills_dir {
            for skill in load_dir(dir) {
                catalog.insert(skill);
            }
        }
        catalog
    }

    /// Add a skill, replacing one with the same id in place
    fn insert(&mut self, skill: Skill) {
        match self.skills.iter_mut().find(|s| s.id == skill.id) {
            Some(existing) => *existing = skill,
            None => self.skills.push(skill),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Skill> {
        self.skills.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Look up skills by id, keeping the given order and skipping unknown ids
    pub fn select(&self, ids: &[String]) -> Vec<Skill> {
        ids.iter().filter_map(|id| self.get(id).cloned()).collect()
    }
}

/// Read every `<id>/SKILL.md` under `dir`, sorted by directory name
fn load_dir(dir: &Path) -> Vec<Skill> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read skills directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.join("SKILL.md").is_file())
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let id = path.file_name()?.to_str()?.to_string();
            match fs::read_to_string(path.join("SKILL.md")) {
                Ok(content) => {
                    debug!("Loaded skill {} from {}", id, path.display());
                    Some(Skill::parse(&id, &content))
                }
                Err(e) => {
                    warn!("Failed to read skill {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}
