//! Processing options accepted at upload time.
//!
//! Every recognized option is listed here with its allow-list. Choice-style
//! options are closed enums generated by [`define_choice_enum!`]; tuning
//! knobs are bounded numeric ranges. [`ProcessingOptions::from_form`]
//! validates a raw form once at intake and produces the immutable options
//! stored on the job.

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;

macro_rules! define_choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            field: $field:literal,
            error: $error:literal,
            default: $default:ident,
            values: { $( $variant:ident = $val:literal ),+ $(,)? }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $( #[serde(rename = $val)] $variant ),+
        }

        impl $name {
            /// Form field carrying this option.
            pub const FIELD: &'static str = $field;

            /// Every allowed value, in declaration order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Wire representation of the value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $val ),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $val => Ok($name::$variant), )+
                    _ => Err(CoreError::Validation($error.to_string())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_choice_enum! {
    /// Audio container for the separated stems.
    OutputFormat {
        field: "output_format",
        error: "Invalid output format",
        default: Mp3,
        values: { Mp3 = "mp3", Wav = "wav", Flac = "flac" }
    }
}

define_choice_enum! {
    /// Whether to emit every stem or a single target plus its complement.
    StemMode {
        field: "stem_mode",
        error: "Invalid stem mode",
        default: All,
        values: { All = "all", Isolate = "isolate" }
    }
}

define_choice_enum! {
    /// Stem to isolate when `stem_mode` is `isolate`.
    Stem {
        field: "isolate_stem",
        error: "Invalid isolate stem",
        default: Vocals,
        values: {
            Vocals = "vocals",
            Drums = "drums",
            Bass = "bass",
            Other = "other",
            Guitar = "guitar",
            Piano = "piano",
        }
    }
}

define_choice_enum! {
    /// Separation model run by the engine.
    Model {
        field: "model",
        error: "Invalid model",
        default: Htdemucs,
        values: {
            Htdemucs = "htdemucs",
            HtdemucsFt = "htdemucs_ft",
            Htdemucs6s = "htdemucs_6s",
            HdemucsMmi = "hdemucs_mmi",
            Mdx = "mdx",
            MdxExtra = "mdx_extra",
            MdxQ = "mdx_q",
            MdxExtraQ = "mdx_extra_q",
        }
    }
}

define_choice_enum! {
    /// Strategy for samples that overflow after separation.
    ClipMode {
        field: "clip_mode",
        error: "Invalid clip mode",
        default: Rescale,
        values: { Rescale = "rescale", Clamp = "clamp" }
    }
}

impl Model {
    /// Models that also produce `guitar` and `piano` stems.
    pub const SIX_STEM: &'static [Model] = &[Model::Htdemucs6s];

    pub fn is_six_stem(self) -> bool {
        Self::SIX_STEM.contains(&self)
    }
}

impl Stem {
    /// Whether only six-stem models can produce this stem.
    pub fn requires_six_stem_model(self) -> bool {
        matches!(self, Stem::Guitar | Stem::Piano)
    }
}

/// Form field for the random-shift count.
pub const SHIFTS_FIELD: &str = "shifts";
/// Form field for the segment length in seconds.
pub const SEGMENT_FIELD: &str = "segment";
/// Form field for the overlap ratio between segments.
pub const OVERLAP_FIELD: &str = "overlap";

pub const SHIFTS_RANGE: RangeInclusive<u32> = 0..=10;
pub const SEGMENT_RANGE: RangeInclusive<u32> = 1..=60;
pub const OVERLAP_RANGE: RangeInclusive<f64> = 0.0..=0.5;

/// Every form field recognized as a processing option.
pub const OPTION_FIELDS: &[&str] = &[
    OutputFormat::FIELD,
    StemMode::FIELD,
    Stem::FIELD,
    Model::FIELD,
    ClipMode::FIELD,
    SHIFTS_FIELD,
    SEGMENT_FIELD,
    OVERLAP_FIELD,
];

/// Validated transformation parameters, immutable once attached to a job.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProcessingOptions {
    pub output_format: OutputFormat,
    pub stem_mode: StemMode,
    pub isolate_stem: Stem,
    pub model: Model,
    pub clip_mode: ClipMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shifts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap: Option<f64>,
}

impl ProcessingOptions {
    /// Build options from raw form values.
    ///
    /// Missing or blank fields take their defaults. A value outside its
    /// allow-list is rejected with a message naming the option; nothing is
    /// coerced. Unrecognized keys are ignored.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, CoreError> {
        let options = Self {
            output_format: parse_choice(form, OutputFormat::FIELD)?,
            stem_mode: parse_choice(form, StemMode::FIELD)?,
            isolate_stem: parse_choice(form, Stem::FIELD)?,
            model: parse_choice(form, Model::FIELD)?,
            clip_mode: parse_choice(form, ClipMode::FIELD)?,
            shifts: parse_in_range(form, SHIFTS_FIELD, &SHIFTS_RANGE, "Invalid shifts value")?,
            segment: parse_in_range(form, SEGMENT_FIELD, &SEGMENT_RANGE, "Invalid segment value")?,
            overlap: parse_in_range(form, OVERLAP_FIELD, &OVERLAP_RANGE, "Invalid overlap value")?,
        };

        options.check_compatibility()?;
        Ok(options)
    }

    /// Reject option combinations the selected model cannot honour.
    pub fn check_compatibility(&self) -> Result<(), CoreError> {
        if self.stem_mode == StemMode::Isolate
            && self.isolate_stem.requires_six_stem_model()
            && !self.model.is_six_stem()
        {
            return Err(CoreError::Validation(
                "Incompatible isolate_stem for selected model".into(),
            ));
        }
        Ok(())
    }

    /// Flatten into `(field, value)` pairs for the engine request.
    ///
    /// Tuning knobs are only included when set so the engine applies its
    /// own defaults otherwise.
    pub fn to_form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            (OutputFormat::FIELD, self.output_format.to_string()),
            (StemMode::FIELD, self.stem_mode.to_string()),
            (Stem::FIELD, self.isolate_stem.to_string()),
            (Model::FIELD, self.model.to_string()),
            (ClipMode::FIELD, self.clip_mode.to_string()),
        ];
        if let Some(shifts) = self.shifts {
            fields.push((SHIFTS_FIELD, shifts.to_string()));
        }
        if let Some(segment) = self.segment {
            fields.push((SEGMENT_FIELD, segment.to_string()));
        }
        if let Some(overlap) = self.overlap {
            fields.push((OVERLAP_FIELD, overlap.to_string()));
        }
        fields
    }
}

fn field_value<'a>(form: &'a HashMap<String, String>, field: &str) -> Option<&'a str> {
    form.get(field).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_choice<T>(form: &HashMap<String, String>, field: &str) -> Result<T, CoreError>
where
    T: FromStr<Err = CoreError> + Default,
{
    match field_value(form, field) {
        Some(value) => value.parse(),
        None => Ok(T::default()),
    }
}

fn parse_in_range<T>(
    form: &HashMap<String, String>,
    field: &str,
    range: &RangeInclusive<T>,
    error: &str,
) -> Result<Option<T>, CoreError>
where
    T: FromStr + PartialOrd,
{
    let Some(raw) = field_value(form, field) else {
        return Ok(None);
    };
    match raw.parse::<T>() {
        Ok(value) if range.contains(&value) => Ok(Some(value)),
        _ => Err(CoreError::Validation(error.to_string())),
    }
}
