//! Pull reader for OSM XML files.
//!
//! Yields nodes and ways one at a time as [`OsmElement`]s so the collector can
//! consume a whole country without the parser holding it in memory. Relations
//! are skipped.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use log::{debug, warn};
use quick_xml::{
    events::{BytesStart, Event},
    reader::Reader,
};
use xz::bufread::XzDecoder;

use crate::{
    data::{OsmElement, OsmId, RawNode, RawWay, Tags},
    errors::{Error, ErrorKind, Result},
};

struct PendingNode {
    id: OsmId,
    lat: Option<f64>,
    lon: Option<f64>,
    tags: Tags,
}

enum Element {
    Node(PendingNode),
    Way(RawWay),
    Relation,
    Tag(String, String),
    NodeRef(OsmId),
    Other,
}

enum Step {
    Open(Element, bool),
    Close(Vec<u8>),
    Skip,
    Eof,
}

fn parse_id(e: &BytesStart, attribute_name: &[u8]) -> Result<OsmId> {
    for attribute in e.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref() == attribute_name {
            return Ok(attribute.unescape_value()?.parse()?);
        }
    }
    Err(Error::new(
        ErrorKind::Parse,
        format!(
            "<{}> is missing its {} attribute",
            String::from_utf8_lossy(e.name().as_ref()),
            String::from_utf8_lossy(attribute_name)
        ),
    ))
}

fn parse_node(e: &BytesStart) -> Result<PendingNode> {
    let mut node = PendingNode {
        id: parse_id(e, b"id")?,
        lat: None,
        lon: None,
        tags: Tags::new(),
    };
    for attribute in e.attributes() {
        let attribute = attribute?;
        match attribute.key.as_ref() {
            b"lat" => node.lat = Some(attribute.unescape_value()?.parse()?),
            b"lon" => node.lon = Some(attribute.unescape_value()?.parse()?),
            _ => (),
        }
    }
    Ok(node)
}

fn parse_tag(e: &BytesStart) -> Result<Element> {
    let mut key = None;
    let mut value = None;
    for attribute in e.attributes() {
        let attribute = attribute?;
        match attribute.key.as_ref() {
            b"k" => key = Some(attribute.unescape_value()?.into_owned()),
            b"v" => value = Some(attribute.unescape_value()?.into_owned()),
            _ => (),
        }
    }
    match (key, value) {
        (Some(key), Some(value)) => Ok(Element::Tag(key, value)),
        _ => Err(Error::new(ErrorKind::Parse, "<tag> needs both k and v attributes")),
    }
}

fn parse_element(e: &BytesStart) -> Result<Element> {
    let element = match e.name().as_ref() {
        b"node" => Element::Node(parse_node(e)?),
        b"way" => Element::Way(RawWay {
            id: parse_id(e, b"id")?,
            tags: Tags::new(),
            refs: Vec::new(),
        }),
        b"relation" => Element::Relation,
        b"tag" => parse_tag(e)?,
        b"nd" => Element::NodeRef(parse_id(e, b"ref")?),
        _ => Element::Other,
    };
    Ok(element)
}

enum Pending {
    Node(PendingNode),
    Way(RawWay),
}

/// Iterator over the nodes and ways of an OSM XML document.
pub struct OsmXmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    pending: Option<Pending>,
    relation_depth: usize,
    finished: bool,
}

impl<R: BufRead> OsmXmlReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        OsmXmlReader {
            reader,
            buf: Vec::new(),
            pending: None,
            relation_depth: 0,
            finished: false,
        }
    }

    fn finish_node(node: PendingNode) -> Option<OsmElement> {
        match (node.lat, node.lon) {
            (Some(lat), Some(lon)) => Some(OsmElement::Node(RawNode {
                id: node.id,
                lat,
                lon,
                tags: node.tags,
            })),
            _ => {
                warn!(node_id = node.id; "Skipping node without a location");
                None
            }
        }
    }

    fn open(&mut self, element: Element, empty: bool) -> Option<OsmElement> {
        match element {
            Element::Relation if !empty => self.relation_depth += 1,
            _ if self.relation_depth > 0 => (),
            Element::Node(node) if empty => return Self::finish_node(node),
            Element::Node(node) => self.pending = Some(Pending::Node(node)),
            Element::Way(way) if empty => return Some(OsmElement::Way(way)),
            Element::Way(way) => self.pending = Some(Pending::Way(way)),
            Element::Tag(key, value) => match self.pending.as_mut() {
                Some(Pending::Node(node)) => {
                    node.tags.insert(key, value);
                }
                Some(Pending::Way(way)) => {
                    way.tags.insert(key, value);
                }
                None => (),
            },
            Element::NodeRef(node_id) => {
                if let Some(Pending::Way(way)) = self.pending.as_mut() {
                    way.refs.push(node_id);
                }
            }
            Element::Relation | Element::Other => (),
        }
        None
    }

    fn close(&mut self, name: &[u8]) -> Option<OsmElement> {
        match name {
            b"relation" => {
                self.relation_depth = self.relation_depth.saturating_sub(1);
                None
            }
            b"node" | b"way" if self.relation_depth == 0 => match self.pending.take()? {
                Pending::Node(node) => Self::finish_node(node),
                Pending::Way(way) => Some(OsmElement::Way(way)),
            },
            _ => None,
        }
    }
}

impl OsmXmlReader<Box<dyn BufRead>> {
    /// Open an OSM XML file, decompressing it on the fly when it ends in `.xz`.
    pub fn open_path(path: &Path) -> Result<Self> {
        let file = BufReader::new(File::open(path).map_err(|err| {
            Error::new(ErrorKind::Io, format!("Could not open {}: {}", path.display(), err))
        })?);
        let compressed = path.extension().map_or(false, |ext| ext == "xz");
        debug!(path = path.to_string_lossy().as_ref(), compressed = compressed; "Opening OSM file");
        let input: Box<dyn BufRead> = if compressed {
            Box::new(BufReader::new(XzDecoder::new(file)))
        } else {
            Box::new(file)
        };
        Ok(OsmXmlReader::new(input))
    }
}

impl<R: BufRead> Iterator for OsmXmlReader<R> {
    type Item = Result<OsmElement>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buf.clear();
            let step = match self.reader.read_event_into(&mut self.buf) {
                Err(err) => Err(err.into()),
                Ok(Event::Eof) => Ok(Step::Eof),
                Ok(Event::Start(e)) => parse_element(&e).map(|element| Step::Open(element, false)),
                Ok(Event::Empty(e)) => parse_element(&e).map(|element| Step::Open(element, true)),
                Ok(Event::End(e)) => Ok(Step::Close(e.name().as_ref().to_vec())),
                Ok(_) => Ok(Step::Skip),
            };
            let produced = match step {
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                Ok(Step::Eof) => {
                    self.finished = true;
                    None
                }
                Ok(Step::Open(element, empty)) => self.open(element, empty),
                Ok(Step::Close(name)) => self.close(&name),
                Ok(Step::Skip) => None,
            };
            if let Some(element) = produced {
                return Some(Ok(element));
            }
        }
        None
    }
}
