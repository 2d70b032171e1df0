//! Application configuration.
//!
//! Runtime settings come from the environment (optionally via `.env`).
//! The transcription prompt and the template layout live together in a JSON
//! file (`configs/vickers_hardness.json`); without one the compiled-in
//! defaults below are used.

use crate::layout::SheetLayout;
use crate::openrouter::DEFAULT_MODEL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_TEMPLATE_PATH: &str = "TEMPLATE MTC - Single Sheet.xlsx";
const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_LAYOUT_PATH: &str = "configs/vickers_hardness.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Prompt and template geometry for one kind of observation sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub name: String,
    pub description: String,
    /// Instruction sent alongside the image.
    pub prompt: String,
    pub layout: SheetLayout,
}

impl ExtractionConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;

        let config: ExtractionConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))?;

        config
            .layout
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid layout in {:?}: {}", path, e))?;

        info!("Loaded config: {} from {:?}", config.name, path);
        Ok(config)
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            name: "vickers_hardness".to_string(),
            description: "Observation Sheet (Mechanical - Vickers Hardness Test)".to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            layout: SheetLayout::vickers(),
        }
    }
}

/// Settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub strict_groups: bool,
    pub extraction: ExtractionConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("OPENROUTER_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .context("OPENROUTER_API_KEY environment variable not set")?;

        let model = lookup("VISION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let template_path = PathBuf::from(
            lookup("TEMPLATE_PATH").unwrap_or_else(|| DEFAULT_TEMPLATE_PATH.to_string()),
        );
        let output_dir =
            PathBuf::from(lookup("OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()));

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .with_context(|| format!("Invalid BIND_ADDR: {}", bind_raw))?;

        let strict_groups = lookup("STRICT_GROUPS")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let extraction = match lookup("LAYOUT_PATH") {
            Some(path) => ExtractionConfig::load(Path::new(&path))?,
            None if Path::new(DEFAULT_LAYOUT_PATH).exists() => {
                ExtractionConfig::load(Path::new(DEFAULT_LAYOUT_PATH))?
            }
            None => {
                info!("No layout file found, using built-in Vickers layout");
                ExtractionConfig::default()
            }
        };

        Ok(Self {
            api_key,
            model,
            template_path,
            output_dir,
            bind_addr,
            strict_groups,
            extraction,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub const DEFAULT_PROMPT: &str = r#"Extract all information from the provided 'Observation Sheet (Mechanical - Vickers Hardness Test)' image into a structured Markdown format.
Please organize the output into the following three sections:

1. Test Summary Information:
   Extract all metadata from the top section, including Customer, Spec & Grade, Test Method, Pipe Size, Atmospheric Conditions, Date, and Requirements. Write every field on its own line as **Label:** value.

2. Verification with Standard Block:
   Extract the block ID, standard value, the five individual readings, the average, the % error, and the remark. Write every field on its own line as **Label:** value.

3. Extracted Hardness Values Table:
   Create a table containing Sr. No., Sample ID No., and Heat No.
   For the 33 hardness measurement columns, group them into three sub-columns as labeled in the image:
   Base (Points 1-6), HAZ (Points 7-24), and Weld (Points 25-33).
   List the numbers for each row separated by commas within those groups. Include the 'Remarks' column at the end.

Separate the sections with a horizontal rule (---).
Ensure all handwritten numbers are transcribed accurately and maintain a clean, professional layout.
"#;
