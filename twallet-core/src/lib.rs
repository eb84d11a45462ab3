//! `twallet-core` is a client for the issuer API of Taiwan's digital wallet
//! (數位憑證皮夾). It registers card templates, issues card instances and detects when
//! the holder has activated an issued card by scanning its QR code.
//!
//! ```rust,no_run
//! use secrecy::SecretString;
//! use twallet_core::{
//!     CardIssuer, ExpireUnit, ExpiryLength, FieldSpec, InstanceFieldValue, TemplateSpec,
//!     ValidationRule,
//! };
//!
//! # async fn issue() -> Result<(), twallet_core::TwalletError> {
//! let issuer = CardIssuer::new(SecretString::from("access token from the sign-up mail"));
//!
//! let template = TemplateSpec::new(
//!     "t_1700000000",
//!     "Member Card",
//!     ExpiryLength::new("1")?,
//!     ExpireUnit::Month,
//! )
//! .with_field(FieldSpec::basic("Name", "name", ValidationRule::ChineseEnglishDigitsUnderscore).on_cover());
//! issuer.create_template(&template).await?;
//!
//! let issued = issuer
//!     .create_instance(
//!         318,
//!         &[InstanceFieldValue::new("name", "Alice")],
//!         Some(Box::new(|vc_cid: String| println!("activated: {vc_cid}"))),
//!     )
//!     .await?;
//! println!("scan me: {}", issued.record.qr_code);
//! # Ok(())
//! # }
//! ```

mod config;
pub use config::*;

mod error;
pub use error::*;

mod envelope;
pub use envelope::Envelope;

mod issuer;
pub use issuer::*;

pub mod logger;

mod poller;
pub use poller::*;

mod types;
pub use types::*;

// private modules
mod cover;
mod http_request;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("twallet_core");
