use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps an identifying value (vehicle registration) so that log output only
/// shows its last four characters. Serialization writes the real value.
#[derive(Clone, Deserialize)]
pub struct Masked<T>(pub T);

const VISIBLE_SUFFIX: usize = 4;

fn write_masked(raw: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= VISIBLE_SUFFIX {
        return f.write_str("****");
    }
    let hidden = chars.len() - VISIBLE_SUFFIX;
    for _ in 0..hidden {
        f.write_str("*")?;
    }
    let tail: String = chars[hidden..].iter().collect();
    f.write_str(&tail)
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_masked(self.0.as_ref(), f)
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_masked(self.0.as_ref(), f)
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_all_but_suffix() {
        assert_eq!(Masked("DL01AB1234").to_string(), "******1234");
        assert_eq!(format!("{:?}", Masked("AB12".to_string())), "****");
    }

    #[test]
    fn test_serializes_real_value() {
        let json = serde_json::to_string(&Masked("DL01AB1234")).unwrap();
        assert_eq!(json, "\"DL01AB1234\"");
    }
}
