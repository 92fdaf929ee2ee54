//! `mod.xml` manifest parsing.
//!
//! The root element carries the package metadata (as attributes or child
//! elements) followed by any number of `<editfile name="...">` blocks whose
//! children are the patch directives, kept in document order. Directive
//! literals are taken verbatim from the element text, whitespace included.

use crate::patch::{Directive, Placement, SearchAnchor};
use anyhow::{Context, Result};
use quick_xml::{events::Event, Reader};

pub const DEFAULT_ICON: &str = "icon.png";

#[derive(Debug, Default, Clone)]
pub struct ModManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub edits: Vec<EditBlock>,
}

#[derive(Debug, Clone)]
pub struct EditBlock {
    pub target: String,
    pub directives: Vec<Directive>,
}

/// Derives the stable mod id from its display name.
pub fn mod_id(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

struct PendingDirective {
    tag: DirectiveTag,
    position: Option<String>,
    text: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DirectiveTag {
    Find,
    FindUp,
    Replace,
    Insert,
}

impl DirectiveTag {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name.to_ascii_lowercase().as_slice() {
            b"find" => Some(DirectiveTag::Find),
            b"findup" => Some(DirectiveTag::FindUp),
            b"replace" => Some(DirectiveTag::Replace),
            b"insert" => Some(DirectiveTag::Insert),
            _ => None,
        }
    }
}

impl PendingDirective {
    fn into_directive(self) -> Directive {
        let position = self.position.as_deref();
        match self.tag {
            DirectiveTag::Find => Directive::Find { text: self.text },
            DirectiveTag::FindUp => Directive::FindUp {
                text: self.text,
                anchor: if position == Some("end") {
                    SearchAnchor::End
                } else {
                    SearchAnchor::Cursor
                },
            },
            DirectiveTag::Replace => Directive::Replace { text: self.text },
            DirectiveTag::Insert => Directive::Insert {
                text: self.text,
                placement: if position == Some("before") {
                    Placement::Before
                } else {
                    Placement::After
                },
            },
        }
    }
}

pub fn parse_manifest(bytes: &[u8]) -> Result<ModManifest> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut manifest = ModManifest::default();
    let mut root_seen = false;
    let mut block: Option<EditBlock> = None;
    let mut directive: Option<PendingDirective> = None;
    let mut meta_field: Option<MetaField> = None;
    let mut meta_text = String::new();

    loop {
        match reader.read_event_into(&mut buf).context("read mod.xml")? {
            Event::Start(e) => {
                if !root_seen {
                    root_seen = true;
                    manifest.name = attr_value(&e, b"name");
                    manifest.version = attr_value(&e, b"version");
                    manifest.author = attr_value(&e, b"author");
                    manifest.description = attr_value(&e, b"description");
                    manifest.icon = attr_value(&e, b"icon");
                } else if e.name().as_ref().eq_ignore_ascii_case(b"editfile") {
                    if let Some(target) = attr_value(&e, b"name") {
                        block = Some(EditBlock {
                            target: normalize_target(&target),
                            directives: Vec::new(),
                        });
                    }
                } else if block.is_some() {
                    if let Some(tag) = DirectiveTag::from_name(e.name().as_ref()) {
                        directive = Some(PendingDirective {
                            tag,
                            position: attr_value(&e, b"position"),
                            text: String::new(),
                        });
                    }
                } else {
                    meta_field = MetaField::from_name(e.name().as_ref());
                    meta_text.clear();
                }
            }
            Event::Empty(e) => {
                if !root_seen {
                    root_seen = true;
                    manifest.name = attr_value(&e, b"name");
                    manifest.version = attr_value(&e, b"version");
                    manifest.author = attr_value(&e, b"author");
                    manifest.description = attr_value(&e, b"description");
                    manifest.icon = attr_value(&e, b"icon");
                } else if e.name().as_ref().eq_ignore_ascii_case(b"editfile") {
                    if let Some(target) = attr_value(&e, b"name") {
                        manifest.edits.push(EditBlock {
                            target: normalize_target(&target),
                            directives: Vec::new(),
                        });
                    }
                } else if let Some(current) = block.as_mut() {
                    if let Some(tag) = DirectiveTag::from_name(e.name().as_ref()) {
                        current.directives.push(
                            PendingDirective {
                                tag,
                                position: attr_value(&e, b"position"),
                                text: String::new(),
                            }
                            .into_directive(),
                        );
                    }
                }
            }
            Event::Text(e) => {
                let text = e.unescape().context("unescape mod.xml text")?;
                if let Some(pending) = directive.as_mut() {
                    pending.text.push_str(&text);
                } else if meta_field.is_some() {
                    meta_text.push_str(&text);
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                if let Some(pending) = directive.as_mut() {
                    pending.text.push_str(&text);
                } else if meta_field.is_some() {
                    meta_text.push_str(&text);
                }
            }
            Event::End(e) => {
                let name = e.name();
                if directive.is_some() && DirectiveTag::from_name(name.as_ref()).is_some() {
                    if let (Some(pending), Some(current)) = (directive.take(), block.as_mut()) {
                        current.directives.push(pending.into_directive());
                    }
                } else if name.as_ref().eq_ignore_ascii_case(b"editfile") {
                    if let Some(current) = block.take() {
                        manifest.edits.push(current);
                    }
                } else if let Some(field) = meta_field.take() {
                    field.assign(&mut manifest, meta_text.trim());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(manifest)
}

#[derive(Clone, Copy)]
enum MetaField {
    Name,
    Version,
    Author,
    Description,
    Icon,
}

impl MetaField {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name.to_ascii_lowercase().as_slice() {
            b"name" => Some(MetaField::Name),
            b"version" => Some(MetaField::Version),
            b"author" => Some(MetaField::Author),
            b"description" => Some(MetaField::Description),
            b"icon" => Some(MetaField::Icon),
            _ => None,
        }
    }

    fn assign(self, manifest: &mut ModManifest, value: &str) {
        if value.is_empty() {
            return;
        }
        let slot = match self {
            MetaField::Name => &mut manifest.name,
            MetaField::Version => &mut manifest.version,
            MetaField::Author => &mut manifest.author,
            MetaField::Description => &mut manifest.description,
            MetaField::Icon => &mut manifest.icon,
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }
}

/// Archive-relative target paths always use forward slashes.
fn normalize_target(target: &str) -> String {
    target.replace('\\', "/")
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            if let Ok(value) = attr.unescape_value() {
                return Some(value.to_string());
            }
        }
    }
    None
}
