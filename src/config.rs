use std::path::{Path, PathBuf};

use encoding_rs::Encoding;

use crate::error::{ConvertError, ConvertResult};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
/// Where a batch conversion reads CSV files from and writes `.bin` files to.
pub struct ConvertConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// A WHATWG encoding label, `utf-8` unless set.
    pub encoding: String,
    /// Extensions (without the dot) of files in `input_dir` that are not tables.
    pub skip_extensions: Vec<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            encoding: String::from("utf-8"),
            skip_extensions: vec![String::from("meta")],
        }
    }
}

impl ConvertConfig {
    pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(input_dir: I, output_dir: O) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }
    /// Resolves [`ConvertConfig::encoding`].
    pub fn encoding(&self) -> ConvertResult<&'static Encoding> {
        Encoding::for_label(self.encoding.trim().as_bytes())
            .ok_or_else(|| ConvertError::UnsupportedEncoding(self.encoding.clone()))
    }
    /// Whether `path` should be left out of a batch.
    pub fn is_skipped(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.skip_extensions.iter().any(|s| s == ext),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConvertConfig::new("csv", "bin");
        assert_eq!(config.encoding().unwrap(), encoding_rs::UTF_8);
        assert!(config.is_skipped(Path::new("csv/Item.csv.meta")));
        assert!(!config.is_skipped(Path::new("csv/Item.csv")));
        assert!(!config.is_skipped(Path::new("csv/README")));
    }

    #[test]
    fn encoding_labels() {
        let mut config = ConvertConfig::default();
        config.encoding = String::from("shift_jis");
        assert_eq!(config.encoding().unwrap(), encoding_rs::SHIFT_JIS);
        config.encoding = String::from("klingon");
        assert!(matches!(config.encoding(), Err(ConvertError::UnsupportedEncoding(_))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_with_defaults() {
        let config: ConvertConfig =
            serde_json::from_str(r#"{ "input_dir": "MasterData/Csv", "output_dir": "MasterData/Bin" }"#)
                .unwrap();
        assert_eq!(config.input_dir, PathBuf::from("MasterData/Csv"));
        assert_eq!(config.encoding, "utf-8");
        assert_eq!(config.skip_extensions, ["meta"]);
    }
}
