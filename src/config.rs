use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::catalog::ClusterConfig;
use crate::dedup::SettleConfig;
use crate::geometry::{Roi, SymbolsGrid, Vector};
use crate::identifier::MatchConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Region of the screen/video frame holding the reels.
    pub roi: Roi,
    /// Symbol grid, relative to the region of interest.
    pub grid: SymbolsGrid,
    pub settle: SettleConfig,
    pub matching: MatchConfig,
    pub cluster: ClusterConfig,
    /// Directory of `<name>.png` catalog images.
    pub catalog_dir: PathBuf,
    /// When set, every symbol crop is written below this directory.
    pub debug_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roi: Roi::new(450, 1500, 129, 729),
            grid: SymbolsGrid {
                start_point: Vector::new(45, 85),
                symbol_size: Vector::new(185, 140),
                offset: Vector::new(0, 20),
                number_of_elements: Vector::new(5, 3),
            },
            settle: SettleConfig::default(),
            matching: MatchConfig::default(),
            cluster: ClusterConfig::default(),
            catalog_dir: PathBuf::from("assets/symbols"),
            debug_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(v) = lookup("SLOT_REELS_ROI") {
            let [left, right, top, bottom] = parse_list::<4>("SLOT_REELS_ROI", &v)?;
            config.roi = Roi::new(left, right, top, bottom);
        }
        if let Some(v) = lookup("SLOT_REELS_GRID_START") {
            config.grid.start_point = parse_vector("SLOT_REELS_GRID_START", &v)?;
        }
        if let Some(v) = lookup("SLOT_REELS_SYMBOL_SIZE") {
            config.grid.symbol_size = parse_vector("SLOT_REELS_SYMBOL_SIZE", &v)?;
        }
        if let Some(v) = lookup("SLOT_REELS_GRID_OFFSET") {
            config.grid.offset = parse_vector("SLOT_REELS_GRID_OFFSET", &v)?;
        }
        if let Some(v) = lookup("SLOT_REELS_GRID_COUNT") {
            config.grid.number_of_elements = parse_vector("SLOT_REELS_GRID_COUNT", &v)?;
        }

        let settle = &mut config.settle;
        parse_into(&lookup, "SLOT_REELS_SKIP_FRAMES", &mut settle.skip_frames)?;
        parse_into(&lookup, "SLOT_REELS_MIN_SIMILAR_RUN", &mut settle.min_similar_run)?;
        parse_into(&lookup, "SLOT_REELS_FRAME_SIMILARITY", &mut settle.similarity_threshold)?;
        if let Some(v) = lookup("SLOT_REELS_FLUSH_TRAILING_RUN") {
            settle.flush_trailing_run = v == "1" || v.eq_ignore_ascii_case("true");
        }

        let matching = &mut config.matching;
        parse_into(&lookup, "SLOT_REELS_MATCH_THRESHOLD", &mut matching.threshold)?;
        parse_into(&lookup, "SLOT_REELS_WINDOW_TRIM", &mut matching.window_trim)?;
        parse_into(&lookup, "SLOT_REELS_WINDOW_STEP", &mut matching.window_step)?;

        let cluster = &mut config.cluster;
        parse_into(&lookup, "SLOT_REELS_CLUSTER_DISTANCE", &mut cluster.distance_threshold)?;
        parse_into(&lookup, "SLOT_REELS_MIN_CLUSTER_SIZE", &mut cluster.min_cluster_size)?;

        if !(0.0..0.5).contains(&config.matching.window_trim) {
            return Err(ConfigError::Invalid {
                name: "SLOT_REELS_WINDOW_TRIM".into(),
                reason: "must be in [0, 0.5)".into(),
            });
        }
        if config.matching.window_step == 0 {
            return Err(ConfigError::Invalid {
                name: "SLOT_REELS_WINDOW_STEP".into(),
                reason: "must be at least 1".into(),
            });
        }

        if let Some(dir) = lookup("SLOT_REELS_CATALOG_DIR") {
            config.catalog_dir = PathBuf::from(dir);
        }
        config.debug_dir = lookup("SLOT_REELS_DEBUG_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);

        Ok(config)
    }
}

/// Read a variable that has no default.
pub fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnv(name.into()))
}

fn parse_into<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(v) = lookup(name) {
        *target = v.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name: name.into(),
            reason: format!("{v}: {e}"),
        })?;
    }
    Ok(())
}

fn parse_list<const N: usize>(name: &str, value: &str) -> Result<[u32; N], ConfigError> {
    let parts: Vec<u32> = value
        .split(',')
        .map(|s| {
            s.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                name: name.into(),
                reason: format!("{s}: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    parts.try_into().map_err(|parts: Vec<u32>| ConfigError::Invalid {
        name: name.into(),
        reason: format!("expected {N} comma-separated values, got {}", parts.len()),
    })
}

fn parse_vector(name: &str, value: &str) -> Result<Vector, ConfigError> {
    let [x, y] = parse_list::<2>(name, value)?;
    Ok(Vector::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.settle.skip_frames, 5);
        assert_eq!(config.matching.threshold, 0.7);
        assert_eq!(config.cluster.min_cluster_size, 5);
        assert!(config.debug_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SLOT_REELS_ROI", "0, 800, 10, 610"),
            ("SLOT_REELS_GRID_COUNT", "3,3"),
            ("SLOT_REELS_MATCH_THRESHOLD", "0.8"),
            ("SLOT_REELS_SKIP_FRAMES", "2"),
            ("SLOT_REELS_DEBUG_DIR", "/tmp/slot-debug"),
        ]))
        .unwrap();
        assert_eq!(config.roi, Roi::new(0, 800, 10, 610));
        assert_eq!(config.grid.number_of_elements, Vector::new(3, 3));
        assert_eq!(config.matching.threshold, 0.8);
        assert_eq!(config.settle.skip_frames, 2);
        assert_eq!(config.debug_dir, Some(PathBuf::from("/tmp/slot-debug")));
    }

    #[test]
    fn test_wrong_arity() {
        let vars = [("SLOT_REELS_GRID_START", "1,2,3")];
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { ref name, .. } if name == "SLOT_REELS_GRID_START")
        );
    }

    #[test]
    fn test_invalid_number() {
        let vars = [("SLOT_REELS_MIN_SIMILAR_RUN", "three")];
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_zero_step_rejected() {
        let vars = [("SLOT_REELS_WINDOW_STEP", "0")];
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { ref name, .. } if name == "SLOT_REELS_WINDOW_STEP")
        );
    }

    #[test]
    fn test_flush_trailing_run_flag() {
        assert!(Config::from_lookup(lookup(&[])).unwrap().settle.flush_trailing_run);

        for off in ["0", "false", "no"] {
            let vars = [("SLOT_REELS_FLUSH_TRAILING_RUN", off)];
            let config = Config::from_lookup(lookup(&vars)).unwrap();
            assert!(!config.settle.flush_trailing_run, "{off}");
        }
        for on in ["1", "TRUE", "true"] {
            let vars = [("SLOT_REELS_FLUSH_TRAILING_RUN", on)];
            let config = Config::from_lookup(lookup(&vars)).unwrap();
            assert!(config.settle.flush_trailing_run, "{on}");
        }
    }
}
