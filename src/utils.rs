//! # Utility Functions Module
//!
//! Small helpers shared by the argument builders.

/// Converts any iterable of string-like items to `Vec<String>`.
///
/// Used by the engine argument builders so that literal flags and formatted
/// values can be mixed without a `.to_string()` on every element.
///
/// # Example
/// ```rust
/// use pdf_batch_compressor::utils::to_string_vec;
///
/// let dpi = 150;
/// let resolution = format!("-dColorImageResolution={}", dpi);
/// let args = to_string_vec(["-dNOPAUSE", resolution.as_str()]);
/// assert_eq!(args[1], "-dColorImageResolution=150");
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds a `Vec<String>` argument list from mixed expressions.
///
/// # Example
/// ```rust
/// use pdf_batch_compressor::args;
///
/// let dpi = 150;
/// let argv = args!["-sDEVICE=pdfwrite", format!("-dColorImageResolution={}", dpi)];
/// assert_eq!(argv.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$(::std::string::ToString::to_string(&$item)),*])
    };
}

/// Formats a `-sKey=value` / `-dKey=value` engine flag
pub fn flag(prefix: char, key: &str, value: impl std::fmt::Display) -> String {
    format!("-{}{}={}", prefix, key, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string_vec_string_literals() {
        let result = to_string_vec(["-dNOPAUSE", "-dBATCH"]);
        assert_eq!(result, vec!["-dNOPAUSE".to_string(), "-dBATCH".to_string()]);
    }

    #[test]
    fn test_to_string_vec_empty() {
        let result: Vec<String> = to_string_vec(Vec::<&str>::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_args_macro_mixed_types() {
        let dpi = 72;
        let result = args!["-dQUIET", dpi, format!("-dPDFSETTINGS={}", "/ebook")];
        assert_eq!(result, vec!["-dQUIET", "72", "-dPDFSETTINGS=/ebook"]);
    }

    #[test]
    fn test_flag() {
        assert_eq!(flag('d', "EmbedAllFonts", true), "-dEmbedAllFonts=true");
        assert_eq!(flag('s', "DEVICE", "pdfwrite"), "-sDEVICE=pdfwrite");
    }
}
