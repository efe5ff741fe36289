//! Streaming XMLTV parser
//!
//! Extracts only the fields the ingest engine uses from an XMLTV document:
//! channels (id, display name, icon) and programmes (channel, start, stop,
//! title, description, category).

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct XmltvChannel {
    pub id: String,
    pub display_name: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct XmltvProgramme {
    pub channel: String,
    pub start: String,
    pub stop: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct XmltvDocument {
    pub channels: Vec<XmltvChannel>,
    pub programmes: Vec<XmltvProgramme>,
}

/// Parse an XMLTV document with the streaming quick-xml reader.
pub fn parse_xmltv(content: &str) -> AppResult<XmltvDocument> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut document = XmltvDocument::default();
    let mut current_channel: Option<XmltvChannel> = None;
    let mut current_programme: Option<XmltvProgramme> = None;
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = element_name(e)?;
                match name.as_str() {
                    "channel" => {
                        let attrs = parse_attributes(e);
                        current_channel = Some(XmltvChannel {
                            id: attrs.get("id").cloned().unwrap_or_default(),
                            display_name: None,
                            icon: None,
                        });
                    }
                    "programme" => {
                        let attrs = parse_attributes(e);
                        current_programme = Some(XmltvProgramme {
                            channel: attrs.get("channel").cloned().unwrap_or_default(),
                            start: attrs.get("start").cloned().unwrap_or_default(),
                            stop: attrs.get("stop").cloned(),
                            title: None,
                            description: None,
                            category: None,
                        });
                    }
                    _ => {}
                }
                current_text.clear();
            }

            Ok(Event::End(ref e)) => {
                let name = end_element_name(e)?;
                let text = current_text.trim();
                match name.as_str() {
                    "display-name" => {
                        if let Some(ref mut channel) = current_channel {
                            if channel.display_name.is_none() && !text.is_empty() {
                                channel.display_name = Some(text.to_string());
                            }
                        }
                    }
                    "title" => {
                        if let Some(ref mut programme) = current_programme {
                            if !text.is_empty() {
                                programme.title = Some(text.to_string());
                            }
                        }
                    }
                    "desc" => {
                        if let Some(ref mut programme) = current_programme {
                            if !text.is_empty() {
                                programme.description = Some(text.to_string());
                            }
                        }
                    }
                    "category" => {
                        if let Some(ref mut programme) = current_programme {
                            if !text.is_empty() {
                                programme.category = Some(text.to_string());
                            }
                        }
                    }
                    "channel" => {
                        if let Some(channel) = current_channel.take() {
                            if !channel.id.is_empty() {
                                document.channels.push(channel);
                            }
                        }
                    }
                    "programme" => {
                        if let Some(programme) = current_programme.take() {
                            if !programme.channel.is_empty() {
                                document.programmes.push(programme);
                            }
                        }
                    }
                    _ => {}
                }
                current_text.clear();
            }

            Ok(Event::Empty(ref e)) => {
                let name = element_name(e)?;
                if name == "icon" {
                    let attrs = parse_attributes(e);
                    if let Some(src) = attrs.get("src") {
                        if let Some(ref mut channel) = current_channel {
                            channel.icon = Some(src.clone());
                        }
                    }
                }
            }

            Ok(Event::Text(e)) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|e| AppError::internal(format!("invalid UTF-8 in XMLTV text: {e}")))?;
                current_text.push_str(text);
            }

            Ok(Event::CData(e)) => {
                let text = std::str::from_utf8(&e)
                    .map_err(|e| AppError::internal(format!("invalid UTF-8 in XMLTV CDATA: {e}")))?;
                current_text.push_str(text);
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(AppError::internal(format!("XMLTV parsing error: {e}")));
            }

            _ => {}
        }
    }

    Ok(document)
}

fn element_name(element: &BytesStart) -> AppResult<String> {
    std::str::from_utf8(element.name().as_ref())
        .map(|s| s.to_string())
        .map_err(|e| AppError::internal(format!("invalid UTF-8 in XMLTV element name: {e}")))
}

fn end_element_name(element: &quick_xml::events::BytesEnd) -> AppResult<String> {
    std::str::from_utf8(element.name().as_ref())
        .map(|s| s.to_string())
        .map_err(|e| AppError::internal(format!("invalid UTF-8 in XMLTV element name: {e}")))
}

fn parse_attributes(element: &BytesStart) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for attr in element.attributes().flatten() {
        if let (Ok(key), Ok(value)) = (
            std::str::from_utf8(attr.key.as_ref()),
            std::str::from_utf8(&attr.value),
        ) {
            attrs.insert(key.to_string(), value.to_string());
        }
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="espn.us">
    <display-name>ESPN</display-name>
    <display-name>ESPN HD</display-name>
    <icon src="http://logos/espn.png"/>
  </channel>
  <programme channel="espn.us" start="20250601120000 +0000" stop="20250601130000 +0000">
    <title>SportsCenter</title>
    <desc>Highlights and analysis.</desc>
    <category>Sports</category>
  </programme>
  <programme channel="espn.us" start="20250601130000 +0000">
    <title>Untitled Block</title>
  </programme>
</tv>"#;

    #[test]
    fn parses_channels_and_programmes() {
        let doc = parse_xmltv(SAMPLE).unwrap();
        assert_eq!(doc.channels.len(), 1);
        let channel = &doc.channels[0];
        assert_eq!(channel.id, "espn.us");
        // first display-name wins
        assert_eq!(channel.display_name.as_deref(), Some("ESPN"));
        assert_eq!(channel.icon.as_deref(), Some("http://logos/espn.png"));

        assert_eq!(doc.programmes.len(), 2);
        let programme = &doc.programmes[0];
        assert_eq!(programme.channel, "espn.us");
        assert_eq!(programme.title.as_deref(), Some("SportsCenter"));
        assert_eq!(programme.description.as_deref(), Some("Highlights and analysis."));
        assert_eq!(programme.category.as_deref(), Some("Sports"));
        assert!(doc.programmes[1].stop.is_none());
    }

    #[test]
    fn parsing_twice_yields_identical_programmes() {
        let a = parse_xmltv(SAMPLE).unwrap();
        let b = parse_xmltv(SAMPLE).unwrap();
        let key = |p: &XmltvProgramme| {
            (
                p.channel.clone(),
                p.start.clone(),
                p.stop.clone(),
                p.title.clone(),
                p.description.clone(),
                p.category.clone(),
            )
        };
        let keys_a: Vec<_> = a.programmes.iter().map(key).collect();
        let keys_b: Vec<_> = b.programmes.iter().map(key).collect();
        assert_eq!(keys_a, keys_b);
    }
}
