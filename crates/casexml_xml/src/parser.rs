use crate::document::Document;
use crate::node::{Attributes, NodeData, NodeId};
use casexml_shared::errors::{Error, ParseError};
use casexml_shared::location::Location;
use casexml_shared::types::Result;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_till1, take_until, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{cut, map, opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use nom_locate::{position, LocatedSpan};

type Span<'a> = LocatedSpan<&'a str>;

/// Deepest element nesting accepted by the parser
pub const MAX_NESTING: usize = 128;

/// Parser error that remembers where in the input it happened
#[derive(Debug)]
struct XmlError<'a> {
    span: Span<'a>,
    message: Option<String>,
    kind: ErrorKind,
}

impl<'a> XmlError<'a> {
    fn failure(span: Span<'a>, message: String) -> nom::Err<Self> {
        nom::Err::Failure(Self {
            span,
            message: Some(message),
            kind: ErrorKind::Verify,
        })
    }
}

impl<'a> nom::error::ParseError<Span<'a>> for XmlError<'a> {
    fn from_error_kind(input: Span<'a>, kind: ErrorKind) -> Self {
        Self {
            span: input,
            message: None,
            kind,
        }
    }

    fn append(_input: Span<'a>, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<Span<'a>, T, XmlError<'a>>;

/// Intermediate tree produced by the combinators before it is moved into the arena
#[derive(Clone, Debug)]
enum Item {
    Element {
        name: String,
        attributes: Attributes,
        children: Vec<Item>,
    },
    Text(String),
    Comment(String),
    Skip,
}

/// Parses a complete XML document
pub fn parse(data: &str) -> Result<Document> {
    let input = Span::new(data);

    let items = match document(input) {
        Ok((rest, _)) if !rest.fragment().is_empty() => {
            return Err(Error::Parse(ParseError {
                message: "unexpected content after root element".into(),
                location: location(&rest),
            }));
        }
        Ok((_, items)) => items,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(Error::Parse(ParseError {
                message: e
                    .message
                    .unwrap_or_else(|| format!("unexpected input ({})", e.kind.description())),
                location: location(&e.span),
            }));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(Error::Parse(ParseError {
                message: "unexpected end of input".into(),
                location: Location::default(),
            }));
        }
    };

    let mut doc = Document::new();
    build(&mut doc, NodeId::DOCUMENT, items);

    Ok(doc)
}

fn location(span: &Span) -> Location {
    Location::new(
        span.location_line() as usize,
        span.get_utf8_column(),
        span.location_offset(),
    )
}

fn build(doc: &mut Document, parent: NodeId, items: Vec<Item>) {
    for item in items {
        match item {
            Item::Element {
                name,
                attributes,
                children,
            } => {
                let id = doc.append_node(parent, NodeData::Element { name, attributes });
                build(doc, id, children);
            }
            // Whitespace between elements is layout, not content
            Item::Text(text) if text.trim().is_empty() => {}
            Item::Text(text) => {
                doc.append_node(parent, NodeData::Text(text));
            }
            Item::Comment(comment) => {
                doc.append_node(parent, NodeData::Comment(comment));
            }
            Item::Skip => {}
        }
    }
}

/// Replaces the predefined entities and character references in raw character data
fn decode(raw: &str) -> std::result::Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];

        let end = rest
            .find(';')
            .ok_or_else(|| "unterminated entity reference".to_string())?;
        let entity = &rest[..end];

        let ch = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };

                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("unknown entity &{entity};"))?
            }
        };

        out.push(ch);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

fn ws(i: Span) -> PResult<Span> {
    multispace0(i)
}

fn name(i: Span) -> PResult<Span> {
    recognize(pair(take_while1(is_name_start), take_while(is_name_char)))(i)
}

fn comment(i: Span) -> PResult<String> {
    map(
        delimited(tag("<!--"), take_until("-->"), tag("-->")),
        |s: Span| s.fragment().to_string(),
    )(i)
}

fn cdata(i: Span) -> PResult<String> {
    map(
        delimited(tag("<![CDATA["), take_until("]]>"), tag("]]>")),
        |s: Span| s.fragment().to_string(),
    )(i)
}

// Processing instructions, including the xml declaration
fn processing_instruction(i: Span) -> PResult<Span> {
    recognize(tuple((tag("<?"), take_until("?>"), tag("?>"))))(i)
}

fn doctype(i: Span) -> PResult<Span> {
    recognize(tuple((
        tag("<!DOCTYPE"),
        take_till(|c: char| c == '[' || c == '>'),
        opt(delimited(char('['), take_until("]"), char(']'))),
        multispace0,
        char('>'),
    )))(i)
}

fn char_data(i: Span) -> PResult<Item> {
    let (rest, raw) = take_till1::<_, Span, XmlError>(|c: char| c == '<')(i)?;
    match decode(raw.fragment()) {
        Ok(text) => Ok((rest, Item::Text(text))),
        Err(message) => Err(XmlError::failure(raw, message)),
    }
}

fn quoted(i: Span) -> PResult<Span> {
    alt((
        delimited(char('"'), take_till(|c: char| c == '"'), char('"')),
        delimited(char('\''), take_till(|c: char| c == '\''), char('\'')),
    ))(i)
}

fn tag_end(i: Span) -> PResult<bool> {
    alt((value(true, tag("/>")), value(false, tag(">"))))(i)
}

fn attribute_value(i: Span) -> PResult<String> {
    let (rest, raw) = quoted(i)?;

    if raw.fragment().contains('<') {
        return Err(XmlError::failure(raw, "'<' not allowed in attribute value".into()));
    }

    match decode(raw.fragment()) {
        Ok(value) => Ok((rest, value)),
        Err(message) => Err(XmlError::failure(raw, message)),
    }
}

fn attribute(i: Span) -> PResult<(Span, String)> {
    let (i, key) = name(i)?;
    let (i, _) = tuple((ws, char('='), ws))(i)?;
    let (i, val) = cut(attribute_value)(i)?;

    Ok((i, (key, val)))
}

fn content<'a>(i: Span<'a>, depth: usize) -> PResult<'a, Vec<Item>> {
    many0(alt((
        map(comment, Item::Comment),
        map(cdata, Item::Text),
        value(Item::Skip, processing_instruction),
        |i: Span<'a>| element(i, depth),
        char_data,
    )))(i)
}

/// Parses an element nested `depth` levels below the root
fn element(i: Span, depth: usize) -> PResult<Item> {
    let (i, _) = char::<Span, XmlError>('<')(i)?;
    let (i, open) = name(i)?;
    if depth >= MAX_NESTING {
        return Err(XmlError::failure(
            open,
            format!("elements nested deeper than {MAX_NESTING} levels"),
        ));
    }

    let (i, raw_attributes) = cut(many0(preceded(multispace1, attribute)))(i)?;
    let mut attributes = Attributes::new();
    for (key, val) in raw_attributes {
        if attributes.iter().any(|(k, _)| k == key.fragment()) {
            return Err(XmlError::failure(
                key,
                format!("duplicate attribute '{}'", key.fragment()),
            ));
        }
        attributes.push((key.fragment().to_string(), val));
    }

    let (i, _) = ws(i)?;
    let (i, self_closing) = cut(tag_end)(i)?;
    if self_closing {
        return Ok((
            i,
            Item::Element {
                name: open.fragment().to_string(),
                attributes,
                children: Vec::new(),
            },
        ));
    }

    let (i, children) = content(i, depth + 1)?;

    let (i, end_pos) = position::<_, XmlError>(i)?;
    let (i, _) = match tag::<_, _, XmlError>("</")(i) {
        Ok(res) => res,
        Err(_) => {
            return Err(XmlError::failure(
                end_pos,
                format!("missing end tag for <{}>", open.fragment()),
            ));
        }
    };
    let (i, close) = cut(name)(i)?;
    if close.fragment() != open.fragment() {
        return Err(XmlError::failure(
            close,
            format!(
                "expected </{}> but found </{}>",
                open.fragment(),
                close.fragment()
            ),
        ));
    }
    let (i, _) = cut(preceded(ws, char('>')))(i)?;

    Ok((
        i,
        Item::Element {
            name: open.fragment().to_string(),
            attributes,
            children,
        },
    ))
}

fn misc(i: Span) -> PResult<Item> {
    preceded(
        ws,
        alt((
            map(comment, Item::Comment),
            value(Item::Skip, processing_instruction),
            value(Item::Skip, doctype),
        )),
    )(i)
}

fn document(i: Span) -> PResult<Vec<Item>> {
    let (i, _) = opt(char::<Span, XmlError>('\u{feff}'))(i)?;
    let (i, mut items) = many0(misc)(i)?;
    let (i, _) = ws(i)?;

    let (i, root) = match element(i, 0) {
        Ok(res) => res,
        Err(nom::Err::Error(e)) => {
            return Err(nom::Err::Failure(XmlError {
                message: Some("missing root element".into()),
                ..e
            }));
        }
        Err(e) => return Err(e),
    };
    items.push(root);

    let (i, trailing) = many0(misc)(i)?;
    items.extend(trailing);
    let (i, _) = ws(i)?;

    Ok((i, items))
}
