mod cover;
mod creator;
mod metadata;

pub use self::cover::Cover;
pub use self::creator::Creator;
pub use self::metadata::Metadata;

fn non_empty(s: impl AsRef<str>) -> Option<String> {
    let s = s.as_ref().trim();
    (!s.is_empty()).then(|| s.to_string())
}
