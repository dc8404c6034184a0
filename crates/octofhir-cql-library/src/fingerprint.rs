//! Translator option fingerprints embedded in compiled libraries

use crate::elm::CompiledLibrary;
use crate::options::TranslatorOptions;

/// Options recorded in the library's annotations.
///
/// Annotations are scanned in order and the first one carrying an option list
/// wins. Returns `None` when no annotation records options, or when the
/// recorded list names an option this crate does not know.
pub fn recorded_options(library: &CompiledLibrary) -> Option<TranslatorOptions> {
    let raw = library
        .annotations
        .iter()
        .find_map(|annotation| annotation.translator_options())?;

    match TranslatorOptions::parse(raw) {
        Ok(options) => Some(options),
        Err(e) => {
            tracing::warn!(
                library = %library.identifier,
                error = %e,
                "Ignoring unreadable translator options fingerprint"
            );
            None
        }
    }
}

/// `true` only if the library records exactly the requested option set.
pub fn matches(library: &CompiledLibrary, requested: &TranslatorOptions) -> bool {
    recorded_options(library).is_some_and(|recorded| &recorded == requested)
}
