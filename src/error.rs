use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three groups. The first group is what a caller of the patching
/// pipeline sees: missing inputs, unreadable images or symbols, resolution and validation
/// failures, signing and write failures. The second group ([`Error::Malformed`],
/// [`Error::OutOfBounds`], [`Error::GoblinErr`]) is produced by the low-level parsers and is
/// folded into [`Error::MalformedImage`] or [`Error::MalformedSymbols`] by the reader before
/// it leaves the crate. The remaining variants wrap I/O.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::NotFound`] - Image or key file does not exist
/// - [`Error::MalformedImage`] - The image could not be parsed as a CLI PE file
/// - [`Error::MalformedSymbols`] - The companion symbol file is corrupt or does not match
///
/// ## Resolution Errors
/// - [`Error::TypeNotFound`], [`Error::MethodNotFound`] - Lookup failures
/// - [`Error::InvalidSignature`], [`Error::InvalidVisibility`], [`Error::InvalidReturnType`],
///   [`Error::NotStatic`] - The method is not a valid initializer
///
/// ## Output Errors
/// - [`Error::NoModuleType`] - The image has no `<Module>` type to attach the initializer to
/// - [`Error::InvalidKey`] - The strong name key pair could not be used
/// - [`Error::WriteError`] - The output could not be written
///
/// # Examples
///
/// ```rust,no_run
/// use modinit::{read, resolve, Error};
/// use std::path::Path;
///
/// let image = read(Path::new("Library.dll"))?;
/// match resolve(&image, "ModuleInitializer", "Initialize") {
///     Ok(method) => println!("Found {:?}", method),
///     Err(Error::MethodNotFound { type_name, method }) => {
///         eprintln!("{type_name} has no method {method}");
///     }
///     Err(e) => eprintln!("error: {e}"),
/// }
/// # Ok::<(), modinit::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input image or the strong name key file does not exist.
    #[error("'{}' does not exist", .0.display())]
    NotFound(PathBuf),

    /// The image could not be parsed as a .NET PE file.
    ///
    /// Carries a description of the first structural problem that was encountered.
    #[error("Malformed image - {0}")]
    MalformedImage(String),

    /// The companion symbol file exists but could not be used.
    ///
    /// Raised for corrupt portable PDBs, Windows (MSF) PDBs and PDBs whose id does not
    /// match the image they were found next to.
    #[error("Malformed symbols - {0}")]
    MalformedSymbols(String),

    /// No type with the requested simple name exists.
    #[error("No type found named '{0}'")]
    TypeNotFound(String),

    /// The resolved type does not declare a method with the requested name.
    #[error("No method named '{method}' exists in the type '{type_name}'")]
    MethodNotFound {
        /// The type that was searched
        type_name: String,
        /// The method name that was requested
        method: String,
    },

    /// The initializer method declares parameters.
    #[error("Module initializer method '{0}' must not have any parameters")]
    InvalidSignature(String),

    /// The initializer method is private or protected.
    #[error(
        "Module initializer method '{0}' may not be private or protected, use public or internal instead"
    )]
    InvalidVisibility(String),

    /// The initializer method does not return `void`.
    #[error("Module initializer method '{method}' must have 'void' as return type, found '{found}'")]
    InvalidReturnType {
        /// The offending method
        method: String,
        /// Canonical full name of the declared return type
        found: String,
    },

    /// The initializer method is an instance method.
    #[error("Module initializer method '{0}' must be static")]
    NotStatic(String),

    /// The image has no `<Module>` type.
    #[error("No module class found")]
    NoModuleType,

    /// The strong name key pair is unreadable or malformed.
    #[error("Invalid strong name key - {0}")]
    InvalidKey(String),

    /// Writing the output failed. The original files are left untouched.
    #[error("Failed to write '{}' - {source}", path.display())]
    WriteError {
        /// The output that could not be produced
        path: PathBuf,
        /// The underlying I/O failure
        source: std::io::Error,
    },

    /// The image uses a feature this crate cannot rewrite.
    #[error("Not supported - {0}")]
    NotSupported(String),

    /// The data is damaged and could not be parsed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error while reading inputs.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),
}

impl Error {
    /// Folds a low-level parse failure into [`Error::MalformedImage`].
    ///
    /// Errors that already carry a caller-facing meaning are returned unchanged.
    pub(crate) fn into_image_error(self) -> Error {
        match self {
            Error::Malformed { .. }
            | Error::OutOfBounds
            | Error::Empty
            | Error::GoblinErr(_) => Error::MalformedImage(self.to_string()),
            other => other,
        }
    }

    /// Folds a low-level parse failure into [`Error::MalformedSymbols`].
    pub(crate) fn into_symbols_error(self) -> Error {
        match self {
            Error::Malformed { .. }
            | Error::OutOfBounds
            | Error::Empty
            | Error::GoblinErr(_)
            | Error::MalformedImage(_)
            | Error::NotSupported(_) => Error::MalformedSymbols(self.to_string()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_level_errors_fold_into_image_errors() {
        let folded = malformed_error!("bad header - {}", 3).into_image_error();
        match folded {
            Error::MalformedImage(message) => assert!(message.contains("bad header - 3")),
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            Error::OutOfBounds.into_image_error(),
            Error::MalformedImage(_)
        ));
        assert!(matches!(
            Error::NoModuleType.into_image_error(),
            Error::NoModuleType
        ));
    }

    #[test]
    fn symbol_errors_fold() {
        assert!(matches!(
            Error::MalformedImage("x".into()).into_symbols_error(),
            Error::MalformedSymbols(_)
        ));
        assert!(matches!(
            Error::NotFound(PathBuf::from("a")).into_symbols_error(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn messages() {
        let err = Error::MethodNotFound {
            type_name: "Init".into(),
            method: "Missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "No method named 'Missing' exists in the type 'Init'"
        );
        assert_eq!(Error::NoModuleType.to_string(), "No module class found");
    }
}
