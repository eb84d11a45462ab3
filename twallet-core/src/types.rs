use serde::{Deserialize, Serialize, Serializer};
use strum::{Display, EnumString};

use crate::envelope::nullable;
use crate::error::TwalletError;

/// Unit of a template's validity period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpireUnit {
    /// Days
    Day,
    /// Months
    Month,
    /// Years
    Year,
}

/// Numeric part of a template's validity period: one to four decimal digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExpiryLength(String);

impl ExpiryLength {
    /// Validates an expiry length.
    ///
    /// # Errors
    ///
    /// Returns [`TwalletError::InvalidInput`] unless `value` is 1 to 4 ASCII digits.
    pub fn new(value: &str) -> Result<Self, TwalletError> {
        if value.is_empty() || value.len() > 4 || !value.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(TwalletError::invalid_input(
                "expire_num",
                format!("`{value}` must be at most 4 decimal digits"),
            ));
        }
        Ok(Self(value.to_string()))
    }

    /// The validated digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<u16> for ExpiryLength {
    type Error = TwalletError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(&value.to_string())
    }
}

/// Server-side validation policy applied to a field's content, identified on the
/// wire by its numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", from = "u32")]
pub enum ValidationRule {
    /// 4: English letters only
    EnglishOnly,
    /// 5: English letters and digits
    Alphanumeric,
    /// 6: e-mail address
    Email,
    /// 7: Taiwanese mobile phone number
    TaiwanMobile,
    /// 8: no `~!@#$%^&*()_-+*/`
    NoSpecialSymbols,
    /// 9: Chinese, English, digits and `_`
    ChineseEnglishDigitsUnderscore,
    /// 10: English, digits and `_`
    EnglishDigitsUnderscore,
    /// 11: Taiwanese national identification number
    NationalId,
    /// 12: Minguo calendar birth date, e.g. `0991231`
    MinguoBirthDate,
    /// 14: resident certificate number
    ResidentCertificateNumber,
    /// 15: foreign resident unified number
    ForeignResidentNumber,
    /// 16: gender
    Gender,
    /// 17: nationality
    Nationality,
    /// 18: Gregorian birth date
    BirthDate,
    /// 19: postal code
    PostalCode,
    /// 20: passport number
    PassportNumber,
    /// 22: Chinese only
    ChineseOnly,
    /// 23: exactly three digits
    ThreeDigits,
    /// 101: URL
    Url,
    /// Any id not known to this crate
    Other(u32),
}

impl ValidationRule {
    /// The wire id of the rule.
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::EnglishOnly => 4,
            Self::Alphanumeric => 5,
            Self::Email => 6,
            Self::TaiwanMobile => 7,
            Self::NoSpecialSymbols => 8,
            Self::ChineseEnglishDigitsUnderscore => 9,
            Self::EnglishDigitsUnderscore => 10,
            Self::NationalId => 11,
            Self::MinguoBirthDate => 12,
            Self::ResidentCertificateNumber => 14,
            Self::ForeignResidentNumber => 15,
            Self::Gender => 16,
            Self::Nationality => 17,
            Self::BirthDate => 18,
            Self::PostalCode => 19,
            Self::PassportNumber => 20,
            Self::ChineseOnly => 22,
            Self::ThreeDigits => 23,
            Self::Url => 101,
            Self::Other(id) => id,
        }
    }
}

impl From<ValidationRule> for u32 {
    fn from(rule: ValidationRule) -> Self {
        rule.id()
    }
}

impl From<u32> for ValidationRule {
    fn from(id: u32) -> Self {
        match id {
            4 => Self::EnglishOnly,
            5 => Self::Alphanumeric,
            6 => Self::Email,
            7 => Self::TaiwanMobile,
            8 => Self::NoSpecialSymbols,
            9 => Self::ChineseEnglishDigitsUnderscore,
            10 => Self::EnglishDigitsUnderscore,
            11 => Self::NationalId,
            12 => Self::MinguoBirthDate,
            14 => Self::ResidentCertificateNumber,
            15 => Self::ForeignResidentNumber,
            16 => Self::Gender,
            17 => Self::Nationality,
            18 => Self::BirthDate,
            19 => Self::PostalCode,
            20 => Self::PassportNumber,
            22 => Self::ChineseOnly,
            23 => Self::ThreeDigits,
            101 => Self::Url,
            other => Self::Other(other),
        }
    }
}

/// One field of a card template.
///
/// The first field of a template is rendered as the caption in the lower left corner
/// of the card in the official wallet app, so field order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Field category, e.g. [`FieldSpec::BASIC`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Human readable label.
    #[serde(rename = "cname")]
    pub label: String,
    /// Machine name, referenced again when populating an instance.
    #[serde(rename = "ename")]
    pub key: String,
    /// Validation applied to the field's content.
    #[serde(rename = "regularExpressionId")]
    pub validation: ValidationRule,
    /// Whether the field feeds the caption shown on the card face.
    #[serde(rename = "cardCoverData", serialize_with = "flag")]
    pub cover_data: bool,
}

impl FieldSpec {
    /// The plain field category.
    pub const BASIC: &'static str = "BASIC";

    /// A [`FieldSpec::BASIC`] field that does not feed the card caption.
    #[must_use]
    pub fn basic(label: &str, key: &str, validation: ValidationRule) -> Self {
        Self {
            kind: Self::BASIC.to_string(),
            label: label.to_string(),
            key: key.to_string(),
            validation,
            cover_data: false,
        }
    }

    /// Marks the field as feeding the card caption.
    #[must_use]
    pub const fn on_cover(mut self) -> Self {
        self.cover_data = true;
        self
    }
}

fn flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

/// Definition of a card template to register with the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSpec {
    /// Template code. Must be unique on the service; a timestamp based value is customary.
    pub serial_no: String,
    /// Display name.
    pub name: String,
    /// Numeric part of the validity period.
    pub expire_length: ExpiryLength,
    /// Unit of the validity period.
    pub expire_unit: ExpireUnit,
    /// Whether other issuers may use and verify the template.
    pub expose: bool,
    /// Ordered field definitions.
    pub fields: Vec<FieldSpec>,
    /// Cover image bytes. Only JPEG and PNG are sent; the service recommends
    /// 320x200 (1.6:1), at most 2048px wide and 40kB to 500kB.
    pub cover: Option<Vec<u8>>,
}

impl TemplateSpec {
    /// A private template with no fields and no cover.
    #[must_use]
    pub fn new(
        serial_no: &str,
        name: &str,
        expire_length: ExpiryLength,
        expire_unit: ExpireUnit,
    ) -> Self {
        Self {
            serial_no: serial_no.to_string(),
            name: name.to_string(),
            expire_length,
            expire_unit,
            expose: false,
            fields: Vec::new(),
            cover: None,
        }
    }

    /// Appends a field after the existing ones.
    #[must_use]
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the visibility flag.
    #[must_use]
    pub const fn exposed(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    /// Attaches a cover image.
    #[must_use]
    pub fn with_cover(mut self, cover: Vec<u8>) -> Self {
        self.cover = Some(cover);
        self
    }
}

/// The content of one field of a card instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceFieldValue {
    /// Machine name of the template field.
    pub ename: String,
    /// Field content.
    pub content: String,
}

impl InstanceFieldValue {
    /// Creates a field value.
    #[must_use]
    pub fn new(ename: &str, content: &str) -> Self {
        Self {
            ename: ename.to_string(),
            content: content.to_string(),
        }
    }
}

/// A card instance as returned by the service on creation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceRecord {
    /// Instance id, used to query its status.
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    /// Business id.
    #[serde(deserialize_with = "nullable")]
    pub business_id: String,
    /// Rendered credential content.
    #[serde(deserialize_with = "nullable")]
    pub content: String,
    /// Creation timestamp.
    #[serde(deserialize_with = "nullable")]
    pub cr_datetime: String,
    /// Creating user.
    #[serde(deserialize_with = "nullable")]
    pub cr_user: i64,
    /// Deep link opening the card in the wallet app.
    #[serde(deserialize_with = "nullable")]
    pub deep_link: String,
    /// Expiry marker.
    #[serde(deserialize_with = "nullable")]
    pub expired: String,
    /// Credential content without presentation wrapping.
    #[serde(deserialize_with = "nullable")]
    pub pure_content: String,
    /// QR code payload the holder scans to receive the card.
    #[serde(deserialize_with = "nullable")]
    pub qr_code: String,
    /// Scheduled revocation message.
    #[serde(deserialize_with = "nullable")]
    pub schedule_revoke_message: String,
    /// Transaction id.
    #[serde(deserialize_with = "nullable")]
    pub transaction_id: String,
    /// Validity flag.
    #[serde(deserialize_with = "nullable")]
    pub valid: i64,
    /// Activation correlation id, present once the holder has scanned the card.
    pub vc_cid: Option<String>,
    /// Name of the template the instance belongs to.
    #[serde(deserialize_with = "nullable")]
    pub vc_item_name: String,
}
