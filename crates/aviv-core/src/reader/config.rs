use super::InstrumentFile;
use crate::domain::{AvivError, AvivResult};
use crate::render::fixed_cell;
use serde::Serialize;
use std::fmt::{Display, Formatter};

pub const CONFIG_TAG: &str = "$CONFIG";
pub const DATE_TAG: &str = "$MDY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    Int,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayFormat {
    Text,
    Fixed(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigScalar {
    Text(String),
    Int(i64),
    Float(f64),
}

impl ConfigScalar {
    fn coerce(token: &str, value_type: ValueType) -> Option<Self> {
        let token = token.trim();
        match value_type {
            ValueType::Text => Some(Self::Text(token.to_string())),
            ValueType::Int => token.parse().ok().map(Self::Int),
            ValueType::Float => token.parse().ok().map(Self::Float),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    fn render(&self, format: DisplayFormat) -> String {
        match (self, format) {
            (Self::Float(value), DisplayFormat::Fixed(precision)) => {
                fixed_cell(*value, 0, precision)
            }
            (Self::Float(value), DisplayFormat::Text) => value.to_string(),
            (Self::Int(value), _) => value.to_string(),
            (Self::Text(value), _) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Scalar(ConfigScalar),
    Tuple(Vec<ConfigScalar>),
}

impl ConfigValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(scalar) => scalar.as_f64(),
            Self::Tuple(_) => None,
        }
    }
}

/// Binds one `$TAG:value` configuration line to a named, typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigField {
    pub source_tag: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub value_type: ValueType,
    pub display_format: DisplayFormat,
    value: Option<ConfigValue>,
}

impl ConfigField {
    pub const fn new(
        source_tag: &'static str,
        name: &'static str,
        title: &'static str,
        value_type: ValueType,
        display_format: DisplayFormat,
    ) -> Self {
        Self {
            source_tag,
            name,
            title,
            value_type,
            display_format,
            value: None,
        }
    }

    pub const fn text(source_tag: &'static str, name: &'static str, title: &'static str) -> Self {
        Self::new(source_tag, name, title, ValueType::Text, DisplayFormat::Text)
    }

    /// Float field shown with three decimals.
    pub const fn float(source_tag: &'static str, name: &'static str, title: &'static str) -> Self {
        Self::new(source_tag, name, title, ValueType::Float, DisplayFormat::Fixed(3))
    }

    pub fn value(&self) -> Option<&ConfigValue> {
        self.value.as_ref()
    }

    pub fn display_value(&self) -> String {
        match &self.value {
            None => "NA".to_string(),
            Some(ConfigValue::Scalar(scalar)) => scalar.render(self.display_format),
            Some(ConfigValue::Tuple(parts)) => {
                let rendered = parts
                    .iter()
                    .map(|part| part.render(self.display_format))
                    .collect::<Vec<_>>();
                match self.value_type {
                    ValueType::Text => rendered.join(":"),
                    ValueType::Int | ValueType::Float => rendered.join(", "),
                }
            }
        }
    }
}

impl Display for ConfigField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.display_value())
    }
}

pub fn universal_fields() -> [ConfigField; 3] {
    [
        ConfigField::text("$EXPNAME", "name", "Name"),
        ConfigField::text("$EXDESC", "description", "Description"),
        ConfigField::text(DATE_TAG, "date", "Date"),
    ]
}

/// Configuration read from a file, keyed by field name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedConfig {
    fields: Vec<ConfigField>,
    raw_date: Option<Vec<String>>,
}

impl ExtractedConfig {
    pub fn fields(&self) -> &[ConfigField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&ConfigField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&ConfigValue> {
        self.get(name).and_then(ConfigField::value)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(ConfigValue::as_f64)
    }

    /// The month/day/year parts of `$MDY` as written in the file.
    pub fn raw_date(&self) -> Option<&[String]> {
        self.raw_date.as_deref()
    }
}

/// Populates `fields` (after the universal name/description/date fields)
/// from the lines following the `$CONFIG` tag.
pub fn extract_config(file: &InstrumentFile, fields: Vec<ConfigField>) -> AvivResult<ExtractedConfig> {
    let mut all_fields = universal_fields().to_vec();
    all_fields.extend(fields);

    let config_start = file
        .lines()
        .iter()
        .position(|line| line.starts_with(CONFIG_TAG))
        .ok_or_else(|| {
            AvivError::format(
                "FORMAT.MISSING_CONFIG",
                format!("no {} section in '{}'", CONFIG_TAG, file.path().display()),
            )
        })?
        + 1;

    let mut raw_date = None;
    for (offset, line) in file.lines()[config_start..].iter().enumerate() {
        let mut tokens = line.split(':');
        let Some(tag) = tokens.next() else {
            continue;
        };
        let values: Vec<&str> = tokens.collect();
        if values.is_empty() {
            continue;
        }

        for field in all_fields.iter_mut().filter(|field| field.source_tag == tag) {
            let mut coerced = Vec::with_capacity(values.len());
            for token in &values {
                let scalar = ConfigScalar::coerce(token, field.value_type).ok_or_else(|| {
                    AvivError::format(
                        "FORMAT.BAD_CONFIG_VALUE",
                        format!(
                            "cannot read '{}' as {:?} for {} on line {} of '{}'",
                            token.trim(),
                            field.value_type,
                            tag,
                            config_start + offset + 1,
                            file.path().display()
                        ),
                    )
                })?;
                coerced.push(scalar);
            }

            if field.source_tag == DATE_TAG {
                let (stored, raw) = assemble_date(&coerced, file)?;
                raw_date = Some(raw);
                field.value = Some(stored);
                continue;
            }

            field.value = Some(if coerced.len() == 1 {
                ConfigValue::Scalar(coerced.remove(0))
            } else {
                ConfigValue::Tuple(coerced)
            });
        }
    }

    Ok(ExtractedConfig {
        fields: all_fields,
        raw_date,
    })
}

/// `$MDY` holds month, day and year; the stored value is `YY.MM.DD` with
/// each part zero-padded to two digits.
fn assemble_date(parts: &[ConfigScalar], file: &InstrumentFile) -> AvivResult<(ConfigValue, Vec<String>)> {
    let raw: Vec<String> = parts
        .iter()
        .map(|part| match part {
            ConfigScalar::Text(text) => text.clone(),
            other => other.render(DisplayFormat::Text),
        })
        .collect();

    if raw.len() != 3 {
        return Err(AvivError::format(
            "FORMAT.BAD_DATE",
            format!(
                "{} in '{}' should have month, day and year but has {} part(s)",
                DATE_TAG,
                file.path().display(),
                raw.len()
            ),
        ));
    }

    let padded: Vec<String> = raw.iter().map(|part| format!("{part:0>2}")).collect();
    let stored = format!("{}.{}.{}", padded[2], padded[0], padded[1]);
    Ok((ConfigValue::Scalar(ConfigScalar::Text(stored)), raw))
}

#[cfg(test)]
mod tests {
    use super::{ConfigField, ConfigScalar, ConfigValue, extract_config};
    use crate::domain::AvivErrorCategory;
    use crate::reader::InstrumentFile;

    const SOURCE: &str = "Aviv experiment file
EXPERIMENT TYPE: Wavelength
$CDHV: 450.0
$CONFIG
$EXPNAME:lysozyme scan
$EXDESC:far UV at 10:30
$MDY:7:4:09
$MONOWL:  222.00
$MONOBW:1.5
$QVEC:1.0:2.0:3.0
";

    fn file() -> InstrumentFile {
        InstrumentFile::from_source("scan.dat", SOURCE).expect("file indexes")
    }

    #[test]
    fn universal_fields_come_first_and_are_populated() {
        let config = extract_config(&file(), vec![ConfigField::float("$MONOWL", "wavelength", "Wavelength")])
            .expect("config extracts");

        let names: Vec<_> = config.fields().iter().map(|field| field.name).collect();
        assert_eq!(names, ["name", "description", "date", "wavelength"]);
        assert_eq!(config.get("name").expect("name").display_value(), "lysozyme scan");
        assert_eq!(config.float("wavelength"), Some(222.0));
        assert_eq!(config.get("wavelength").expect("field").to_string(), "Wavelength: 222.000");
    }

    #[test]
    fn date_is_padded_and_reordered() {
        let config = extract_config(&file(), Vec::new()).expect("config extracts");
        assert_eq!(
            config.value("date"),
            Some(&ConfigValue::Scalar(ConfigScalar::Text("09.07.04".to_string())))
        );
        assert_eq!(config.raw_date(), Some(&["7".to_string(), "4".to_string(), "09".to_string()][..]));
    }

    #[test]
    fn multi_part_values_are_kept_as_tuples() {
        let config = extract_config(&file(), vec![ConfigField::float("$QVEC", "qvec", "Q vector")])
            .expect("config extracts");
        assert_eq!(
            config.value("qvec"),
            Some(&ConfigValue::Tuple(vec![
                ConfigScalar::Float(1.0),
                ConfigScalar::Float(2.0),
                ConfigScalar::Float(3.0),
            ]))
        );
        assert_eq!(config.get("description").expect("field").display_value(), "far UV at 10:30");
    }

    #[test]
    fn absent_tags_render_as_na() {
        let config = extract_config(&file(), vec![ConfigField::float("$TEMPSP", "sample_temperature", "Sample temperature")])
            .expect("config extracts");
        assert_eq!(config.value("sample_temperature"), None);
        assert_eq!(
            config.get("sample_temperature").expect("field").to_string(),
            "Sample temperature: NA"
        );
    }

    #[test]
    fn missing_config_section_is_a_format_error() {
        let source = "Aviv experiment file\nEXPERIMENT TYPE: pH\n$CDHV: 450.0\n";
        let file = InstrumentFile::from_source("bare.dat", source).expect("file indexes");
        let error = extract_config(&file, Vec::new()).expect_err("no $CONFIG should fail");
        assert_eq!(error.category(), AvivErrorCategory::Format);
        assert_eq!(error.code(), "FORMAT.MISSING_CONFIG");
    }

    #[test]
    fn unparseable_float_names_the_tag() {
        let source = format!("{SOURCE}$MONOBW:wide\n");
        let file = InstrumentFile::from_source("bad.dat", &source).expect("file indexes");
        let error = extract_config(&file, vec![ConfigField::float("$MONOBW", "bandwidth", "Bandwidth")])
            .expect_err("bad float should fail");
        assert_eq!(error.code(), "FORMAT.BAD_CONFIG_VALUE");
        assert!(error.message().contains("$MONOBW"));
    }
}
