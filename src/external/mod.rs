pub mod click;
pub mod payme;
pub mod translator;

pub use translator::{HttpTranslator, IdentityTranslator, Translator, build_translator};
