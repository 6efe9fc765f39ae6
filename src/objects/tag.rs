//! Annotated tag objects.

use super::commit::Signature;
use super::oid::Oid;
use super::store::{ObjectType, RawObject};
use crate::error::{Error, Result};

/// An annotated tag object.
///
/// Lightweight tags have no object at all; they are plain refs under
/// `refs/tags/` pointing at a commit.
#[derive(Debug, Clone)]
pub struct TagObject {
    target: Oid,
    target_type: ObjectType,
    name: String,
    tagger: Option<Signature>,
    message: String,
}

impl TagObject {
    /// Creates a tag object pointing at `target`.
    pub fn new(
        target: Oid,
        target_type: ObjectType,
        name: impl Into<String>,
        tagger: Signature,
        message: impl Into<String>,
    ) -> Self {
        TagObject {
            target,
            target_type,
            name: name.into(),
            tagger: Some(tagger),
            message: message.into(),
        }
    }

    /// Parses a tag body.
    ///
    /// ```text
    /// object <sha1>
    /// type <type>
    /// tag <tag-name>
    /// tagger <signature>
    ///
    /// <message>
    /// ```
    ///
    /// Some very old tags lack a `tagger` line, so it is optional here.
    pub fn parse(oid: &Oid, raw: RawObject) -> Result<Self> {
        if raw.object_type != ObjectType::Tag {
            return Err(Error::TypeMismatch {
                expected: "tag",
                actual: raw.object_type.as_str(),
            });
        }

        let content = std::str::from_utf8(&raw.content).map_err(|_| Error::InvalidUtf8)?;
        let (headers, message) = content.split_once("\n\n").unwrap_or((content, ""));

        let mut target = None;
        let mut target_type = None;
        let mut name = None;
        let mut tagger = None;

        for line in headers.lines() {
            if let Some(value) = line.strip_prefix("object ") {
                target = Some(Oid::from_hex(value)?);
            } else if let Some(value) = line.strip_prefix("type ") {
                target_type = ObjectType::parse(value);
            } else if let Some(value) = line.strip_prefix("tag ") {
                name = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("tagger ") {
                tagger = Some(Signature::parse(value)?);
            }
        }

        let missing = |field: &str| Error::InvalidObject {
            oid: oid.to_hex(),
            reason: format!("missing {}", field),
        };

        Ok(TagObject {
            target: target.ok_or_else(|| missing("object"))?,
            target_type: target_type.ok_or_else(|| missing("type"))?,
            name: name.ok_or_else(|| missing("tag name"))?,
            tagger,
            message: message.to_string(),
        })
    }

    /// Encodes the tag body.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = format!(
            "object {}\ntype {}\ntag {}\n",
            self.target,
            self.target_type.as_str(),
            self.name
        );
        if let Some(tagger) = &self.tagger {
            out.push_str(&format!("tagger {}\n", tagger.format()));
        }
        out.push('\n');
        out.push_str(&self.message);
        if !self.message.ends_with('\n') {
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Returns the id of the tagged object.
    pub fn target(&self) -> &Oid {
        &self.target
    }

    /// Returns the type of the tagged object.
    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    /// Returns the tag name recorded in the object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tagger, if recorded.
    pub fn tagger(&self) -> Option<&Signature> {
        self.tagger.as_ref()
    }

    /// Returns the message without the trailing newline git appends.
    pub fn message(&self) -> &str {
        self.message.strip_suffix('\n').unwrap_or(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "abcdef0123456789abcdef0123456789abcdef01";

    fn tag_oid() -> Oid {
        Oid::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap()
    }

    #[test]
    fn test_serialize_then_parse() {
        let tagger = Signature::new("Rel Eng", "rel@example.com", 1_700_000_000, 60);
        let tag = TagObject::new(
            Oid::from_hex(TARGET).unwrap(),
            ObjectType::Commit,
            "v1.0.0",
            tagger.clone(),
            "First release",
        );

        let parsed = TagObject::parse(
            &tag_oid(),
            RawObject {
                object_type: ObjectType::Tag,
                content: tag.serialize(),
            },
        )
        .unwrap();

        assert_eq!(parsed.target().to_hex(), TARGET);
        assert_eq!(parsed.target_type(), ObjectType::Commit);
        assert_eq!(parsed.name(), "v1.0.0");
        assert_eq!(parsed.tagger(), Some(&tagger));
        assert_eq!(parsed.message(), "First release");
    }

    #[test]
    fn test_parse_without_tagger() {
        let content = format!("object {}\ntype commit\ntag old\n\nancient\n", TARGET);
        let parsed = TagObject::parse(
            &tag_oid(),
            RawObject {
                object_type: ObjectType::Tag,
                content: content.into_bytes(),
            },
        )
        .unwrap();
        assert!(parsed.tagger().is_none());
        assert_eq!(parsed.message(), "ancient");
    }

    #[test]
    fn test_parse_missing_object_line() {
        let raw = RawObject {
            object_type: ObjectType::Tag,
            content: b"type commit\ntag v1\n\nmsg\n".to_vec(),
        };
        assert!(matches!(
            TagObject::parse(&tag_oid(), raw),
            Err(Error::InvalidObject { .. })
        ));
    }

    #[test]
    fn test_parse_type_mismatch() {
        let raw = RawObject {
            object_type: ObjectType::Commit,
            content: vec![],
        };
        assert!(matches!(
            TagObject::parse(&tag_oid(), raw),
            Err(Error::TypeMismatch { expected: "tag", .. })
        ));
    }
}
