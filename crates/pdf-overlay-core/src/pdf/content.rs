//! Page content as an ordered list of drawable objects.
//!
//! A content stream is split into self-contained objects: each one records the
//! graphics state in force when it was drawn (state is tracked across `q`/`Q`,
//! clipping paths become state) and the marked-content sequences enclosing it.
//! Writing the list back emits one `q ... Q` block per object, so objects can
//! be removed or reordered without disturbing the rest of the page.
//!
//! Only the effective state is recorded: the `cm`/clip sequence plus the last
//! value of every other parameter. Content lopdf can't decode is kept verbatim
//! as a single opaque object.

use std::sync::atomic::{AtomicU64, Ordering};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, StringFormat};
use tracing::warn;

use crate::engine::{ObjectId, ObjectKind};
use crate::geometry::Matrix;

/// Operators that only change graphics or text state.
const STATE_OPERATORS: &[&str] = &[
    "cm", "w", "J", "j", "M", "d", "ri", "i", "gs", "CS", "cs", "SC", "SCN", "sc", "scn", "G", "g",
    "RG", "rg", "K", "k", "Tc", "Tw", "Tz", "TL", "Tf", "Tr", "Ts",
];

const PATH_CONSTRUCTION: &[&str] = &["m", "l", "c", "v", "y", "h", "re", "W", "W*"];

const PATH_PAINTING: &[&str] = &["S", "s", "f", "F", "f*", "B", "B*", "b", "b*"];

const STROKE_COLOUR: &[&str] = &["CS", "SC", "SCN", "G", "RG", "K"];

const FILL_COLOUR: &[&str] = &["cs", "sc", "scn", "g", "rg", "k"];

/// Page-object ids are unique across every document in the process.
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_object_id() -> ObjectId {
    ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
}

/// A marked-content annotation (`BMC`/`BDC`) on an object.
#[derive(Debug, Clone)]
pub struct Mark {
    pub tag: String,
    /// Inline property dictionary, or a name referring to `/Properties`
    pub properties: Option<Object>,
}

impl Mark {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            properties: None,
        }
    }

    fn from_operation(op: &Operation) -> Self {
        let tag = match op.operands.first() {
            Some(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
            _ => String::new(),
        };
        Self {
            tag,
            properties: op.operands.get(1).cloned(),
        }
    }

    /// Store `value` under `key`, turning the properties into an inline dictionary.
    pub fn set(&mut self, key: &str, value: Object) {
        match &mut self.properties {
            Some(Object::Dictionary(dict)) => dict.set(key, value),
            _ => self.properties = Some(Object::Dictionary(Dictionary::from_iter([(key, value)]))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        match &self.properties {
            Some(Object::Dictionary(dict)) => dict.get(key.as_bytes()).ok(),
            _ => None,
        }
    }

    fn begin_operation(&self) -> Operation {
        let tag = Object::Name(self.tag.as_bytes().to_vec());
        match &self.properties {
            Some(props) => Operation::new("BDC", vec![tag, props.clone()]),
            None => Operation::new("BMC", vec![tag]),
        }
    }
}

/// Encode `value` as a PDF text string (UTF-16BE with BOM when not ASCII).
pub fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xfe, 0xff];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// One drawable unit on a page.
#[derive(Debug, Clone)]
pub struct PageObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// State operators in force when the object was drawn
    pub state: Vec<Operation>,
    /// Drawing operators (empty for forms, which are drawn by name)
    pub ops: Vec<Operation>,
    pub marks: Vec<Mark>,
    /// Applied after the object's own state
    pub transform: Matrix,
    /// Form XObject backing an imported page
    pub form: Option<lopdf::ObjectId>,
    /// Undecodable content written back byte for byte
    pub raw: Option<Vec<u8>>,
}

impl PageObject {
    /// A detached form object drawing XObject `form`.
    pub fn form(id: ObjectId, form: lopdf::ObjectId) -> Self {
        Self {
            id,
            kind: ObjectKind::Form,
            state: Vec::new(),
            ops: Vec::new(),
            marks: Vec::new(),
            transform: Matrix::IDENTITY,
            form: Some(form),
            raw: None,
        }
    }

    /// Content bytes that could not be split, kept as one object.
    pub fn opaque(id: ObjectId, raw: Vec<u8>) -> Self {
        Self {
            id,
            kind: ObjectKind::Opaque,
            state: Vec::new(),
            ops: Vec::new(),
            marks: Vec::new(),
            transform: Matrix::IDENTITY,
            form: None,
            raw: Some(raw),
        }
    }

    /// Operators opening and closing the object's `q ... Q` block.
    fn frame(&self) -> (Vec<Operation>, Vec<Operation>) {
        let mut open: Vec<Operation> = self.marks.iter().map(Mark::begin_operation).collect();
        open.push(Operation::new("q", vec![]));
        if !self.transform.is_identity() {
            open.push(cm_operation(self.transform));
        }

        let mut close = vec![Operation::new("Q", vec![])];
        close.extend(self.marks.iter().map(|_| Operation::new("EMC", vec![])));
        (open, close)
    }

    /// Emit the object as a self-contained operator block.
    ///
    /// `form_name` is the resource name the page uses for [`Self::form`].
    /// Raw bytes of an opaque object are not operators; [`Self::encode`]
    /// writes them.
    pub fn to_operations(&self, form_name: Option<&[u8]>) -> Vec<Operation> {
        let (mut out, close) = self.frame();
        out.extend(self.state.iter().cloned());
        out.extend(self.ops.iter().cloned());

        if let Some(name) = form_name {
            out.push(Operation::new("Do", vec![Object::Name(name.to_vec())]));
        }

        out.extend(close);
        out
    }

    /// Encode the object's block as content-stream bytes.
    pub fn encode(&self, form_name: Option<&[u8]>) -> Result<Vec<u8>, lopdf::Error> {
        let Some(raw) = &self.raw else {
            return Content {
                operations: self.to_operations(form_name),
            }
            .encode();
        };

        let (open, close) = self.frame();
        let mut bytes = Content { operations: open }.encode()?;
        bytes.push(b'\n');
        bytes.extend_from_slice(raw);
        bytes.push(b'\n');
        bytes.extend(Content { operations: close }.encode()?);
        Ok(bytes)
    }
}

fn cm_operation(matrix: Matrix) -> Operation {
    let operands = matrix.to_array().into_iter().map(Object::Real).collect();
    Operation::new("cm", operands)
}

fn matrix_operands(op: &Operation) -> Option<Matrix> {
    let values: Vec<f32> = op.operands.iter().filter_map(|o| o.as_float().ok()).collect();
    <[f32; 6]>::try_from(values).ok().map(Matrix::from_array)
}

/// Whether setting `new` makes the earlier `old` irrelevant.
fn supersedes(new: &Operation, old: &Operation) -> bool {
    let (new_op, old_op) = (new.operator.as_str(), old.operator.as_str());
    for group in [STROKE_COLOUR, FILL_COLOUR] {
        if group.contains(&new_op) {
            if !group.contains(&old_op) {
                return false;
            }
            // A colour value keeps the colour space it is interpreted in.
            return match new_op {
                "SC" | "SCN" | "sc" | "scn" => matches!(old_op, "SC" | "SCN" | "sc" | "scn"),
                _ => true,
            };
        }
    }
    match new_op {
        // Each extended state dictionary may set different parameters.
        "gs" => old_op == "gs" && old.operands == new.operands,
        _ => new_op == old_op,
    }
}

/// Effective graphics and text state at a point in the content stream.
#[derive(Debug, Clone, Default)]
struct GraphicsState {
    /// `cm` and clipping paths, in order
    placement: Vec<Operation>,
    /// Latest value of every other parameter
    params: Vec<Operation>,
}

impl GraphicsState {
    fn set(&mut self, op: Operation) {
        if op.operator == "cm" {
            self.concat(op);
            return;
        }
        self.params.retain(|old| !supersedes(&op, old));
        self.params.push(op);
    }

    fn concat(&mut self, op: Operation) {
        if let Some(next) = matrix_operands(&op) {
            if let Some(last) = self.placement.last_mut().filter(|last| last.operator == "cm") {
                if let Some(prev) = matrix_operands(last) {
                    *last = cm_operation(next.concat(&prev));
                    return;
                }
            }
        }
        self.placement.push(op);
    }

    /// Intersect the clip with `path`.
    fn clip(&mut self, path: Vec<Operation>) {
        self.placement.extend(path);
        self.placement.push(Operation::new("n", vec![]));
    }

    fn to_operations(&self) -> Vec<Operation> {
        self.placement.iter().chain(&self.params).cloned().collect()
    }
}

enum Group {
    Text(Vec<Operation>),
    InlineImage(Vec<Operation>),
}

struct Splitter<F> {
    next_id: F,
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    marks: Vec<Mark>,
    path: Vec<Operation>,
    group: Option<Group>,
    objects: Vec<PageObject>,
}

impl<F: FnMut() -> ObjectId> Splitter<F> {
    fn emit(&mut self, kind: ObjectKind, ops: Vec<Operation>) {
        self.objects.push(PageObject {
            id: (self.next_id)(),
            kind,
            state: self.state.to_operations(),
            ops,
            marks: self.marks.clone(),
            transform: Matrix::IDENTITY,
            form: None,
            raw: None,
        });
    }

    fn finish_group(&mut self) {
        match self.group.take() {
            Some(Group::Text(ops)) => {
                // Text state and colour set inside BT..ET outlive the text object.
                let carried: Vec<Operation> = ops
                    .iter()
                    .filter(|op| is_state_operator(&op.operator))
                    .cloned()
                    .collect();
                self.emit(ObjectKind::Text, ops);
                for op in carried {
                    self.state.set(op);
                }
            }
            Some(Group::InlineImage(ops)) => self.emit(ObjectKind::Image, ops),
            None => {}
        }
    }

    fn feed(&mut self, op: Operation) {
        match &mut self.group {
            Some(Group::Text(ops)) => {
                let end = op.operator == "ET";
                ops.push(op);
                if end {
                    self.finish_group();
                }
                return;
            }
            Some(Group::InlineImage(ops)) => {
                if op.operator == "ID" || op.operator == "EI" {
                    let end = op.operator == "EI";
                    ops.push(op);
                    if end {
                        self.finish_group();
                    }
                    return;
                }
                // The parser delivered the whole inline image as a single BI.
                self.finish_group();
            }
            None => {}
        }

        match op.operator.as_str() {
            "q" => self.saved.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "BT" => self.group = Some(Group::Text(vec![op])),
            "BI" => self.group = Some(Group::InlineImage(vec![op])),
            "BMC" | "BDC" => self.marks.push(Mark::from_operation(&op)),
            "EMC" => {
                self.marks.pop();
            }
            "Do" => self.emit(ObjectKind::XObject, vec![op]),
            "sh" => self.emit(ObjectKind::Shading, vec![op]),
            "n" => {
                if clips(&self.path) {
                    let path = std::mem::take(&mut self.path);
                    self.state.clip(path);
                } else {
                    self.path.clear();
                }
            }
            operator if PATH_CONSTRUCTION.contains(&operator) => self.path.push(op),
            operator if PATH_PAINTING.contains(&operator) => {
                let mut ops = std::mem::take(&mut self.path);
                let clip = clips(&ops).then(|| ops.clone());
                ops.push(op);
                self.emit(ObjectKind::Path, ops);
                if let Some(clip) = clip {
                    self.state.clip(clip);
                }
            }
            operator if is_state_operator(operator) => self.state.set(op),
            // Marked points, compatibility sections and Type 3 glyph metrics
            // carry nothing drawable.
            _ => {}
        }
    }
}

fn is_state_operator(operator: &str) -> bool {
    STATE_OPERATORS.contains(&operator)
}

fn clips(path: &[Operation]) -> bool {
    path.iter().any(|op| op.operator == "W" || op.operator == "W*")
}

/// Split decoded content operations into page objects, in drawing order.
pub fn split_objects<F>(operations: Vec<Operation>, next_id: F) -> Vec<PageObject>
where
    F: FnMut() -> ObjectId,
{
    let mut splitter = Splitter {
        next_id,
        state: GraphicsState::default(),
        saved: Vec::new(),
        marks: Vec::new(),
        path: Vec::new(),
        group: None,
        objects: Vec::new(),
    };

    for op in operations {
        splitter.feed(op);
    }
    splitter.finish_group();

    splitter.objects
}

/// Decode page content and split it into objects.
///
/// Content that fails to decode becomes a single opaque object, so the page
/// stays usable and is written back unchanged.
pub fn parse_objects(content: &[u8]) -> Vec<PageObject> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }
    match Content::decode(content) {
        Ok(decoded) => split_objects(decoded.operations, next_object_id),
        Err(e) => {
            warn!("Keeping undecodable page content as one object: {}", e);
            vec![PageObject::opaque(next_object_id(), content.to_vec())]
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn split(source: &str) -> Vec<PageObject> {
        let content = Content::decode(source.as_bytes()).unwrap();
        let mut next = 0;
        split_objects(content.operations, || {
            next += 1;
            ObjectId(next)
        })
    }

    fn operators(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(|op| op.operator.as_str()).collect()
    }

    #[test]
    fn test_split_paths_and_text() {
        let objects = split(
            "0 0 1 rg 10 10 50 50 re f\n\
             BT /F1 12 Tf 100 700 Td (Hello) Tj ET\n\
             0 0 m 100 100 l S",
        );

        let kinds: Vec<ObjectKind> = objects.iter().map(|o| o.kind).collect();
        assert_eq!(kinds, vec![ObjectKind::Path, ObjectKind::Text, ObjectKind::Path]);
        assert_eq!(operators(&objects[0].state), vec!["rg"]);
        assert_eq!(operators(&objects[0].ops), vec!["re", "f"]);
        assert_eq!(operators(&objects[1].ops), vec!["BT", "Tf", "Td", "Tj", "ET"]);
        // Tf set inside the text object persists for later objects.
        assert_eq!(operators(&objects[2].state), vec!["rg", "Tf"]);
    }

    #[test]
    fn test_state_restored_after_q() {
        let objects = split("q 1 0 0 1 50 50 cm 0 0 10 10 re f Q 0 0 10 10 re f");

        assert_eq!(objects.len(), 2);
        assert_eq!(operators(&objects[0].state), vec!["cm"]);
        assert!(objects[1].state.is_empty());
    }

    #[test]
    fn test_state_keeps_last_value() {
        let objects = split("1 0 0 rg 2 w 0 0 1 rg 3 w /GS0 gs /GS1 gs /GS0 gs 0 0 5 5 re f");

        assert_eq!(operators(&objects[0].state), vec!["rg", "w", "gs", "gs"]);
        let fill: Vec<f32> = objects[0].state[0]
            .operands
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect();
        assert_eq!(fill, vec![0.0, 0.0, 1.0]);
        assert!(matches!(objects[0].state[3].operands.as_slice(), [Object::Name(n)] if n == b"GS0"));
    }

    #[test]
    fn test_colour_value_keeps_colour_space() {
        let objects = split("/CS0 cs 0.5 scn 0.7 scn 0 0 5 5 re f 0 g 0 0 5 5 re f");

        assert_eq!(operators(&objects[0].state), vec!["cs", "scn"]);
        assert!(matches!(objects[0].state[1].operands.as_slice(), [Object::Real(v)] if (*v - 0.7).abs() < 1e-6));
        // A device colour replaces both the space and the value.
        assert_eq!(operators(&objects[1].state), vec!["g"]);
    }

    #[test]
    fn test_consecutive_cm_merge() {
        let objects = split("1 0 0 1 10 0 cm 2 0 0 2 0 0 cm 0 0 5 5 re f");

        assert_eq!(operators(&objects[0].state), vec!["cm"]);
        assert_eq!(
            matrix_operands(&objects[0].state[0]),
            Some(Matrix::new(2.0, 0.0, 0.0, 2.0, 10.0, 0.0))
        );
    }

    #[test]
    fn test_repeated_text_state_stays_bounded() {
        let source: String = (0..2000)
            .map(|y| format!("0 0 0 rg BT /F1 12 Tf 10 {y} Td (line) Tj ET\n"))
            .collect();
        let objects = split(&source);
        assert_eq!(objects.len(), 2000);
        assert!(objects.iter().all(|o| o.state.len() <= 2));

        let regenerated: usize = objects.iter().map(|o| o.encode(None).unwrap().len() + 1).sum();
        assert!(regenerated < 3 * source.len(), "{regenerated} bytes from {}", source.len());
    }

    #[test]
    fn test_undecodable_content_is_opaque() {
        let source = b"q 10 0 0 10 0 0 cm BI /W 1 /H 1 /BPC 8 /CS /G /F /AHx ID 80> EI Q";
        let objects = parse_objects(source);

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].kind, ObjectKind::Opaque);
        assert!(objects[0].to_operations(None).iter().all(|op| op.operator == "q" || op.operator == "Q"));

        let encoded = objects[0].encode(None).unwrap();
        assert!(encoded.starts_with(b"q\n"));
        assert!(encoded.ends_with(b"\nQ"));
        assert!(encoded.windows(source.len()).any(|w| w == source));
    }

    #[test]
    fn test_object_ids_are_unique() {
        let first = parse_objects(b"0 0 1 1 re f");
        let second = parse_objects(b"0 0 1 1 re f");
        assert_ne!(first[0].id, second[0].id);
    }

    #[test]
    fn test_clip_becomes_state() {
        let objects = split("0 0 100 100 re W n /Im0 Do");

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].kind, ObjectKind::XObject);
        assert_eq!(operators(&objects[0].state), vec!["re", "W", "n"]);
    }

    #[test]
    fn test_marked_content_attaches_to_objects() {
        let objects = split("/Artifact BMC 0 0 5 5 re f EMC /Span <</ActualText (x)>> BDC /Im1 Do EMC /Im2 Do");

        assert_eq!(objects.len(), 3);
        assert_eq!(objects[0].marks[0].tag, "Artifact");
        assert!(objects[0].marks[0].properties.is_none());
        assert_eq!(objects[1].marks[0].tag, "Span");
        assert!(objects[1].marks[0].get("ActualText").is_some());
        assert!(objects[2].marks.is_empty());
    }

    #[test]
    fn test_emitted_block_is_self_contained() {
        let mut objects = split("0 0 1 rg 10 10 50 50 re f");
        let mut object = objects.remove(0);
        object.transform = Matrix::translate(5.0, 6.0);
        object.marks.push(Mark::new("Tag"));

        let ops = object.to_operations(None);
        assert_eq!(operators(&ops), vec!["BMC", "q", "cm", "rg", "re", "f", "Q", "EMC"]);

        let encoded = Content { operations: ops }.encode().unwrap();
        let reparsed = split(std::str::from_utf8(&encoded).unwrap());
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed[0].marks[0].tag, "Tag");
    }

    #[test]
    fn test_form_emits_do() {
        let mut form = PageObject::form(ObjectId(9), (12, 0));
        let mut mark = Mark::new("RichText");
        mark.set("HTML", text_string("<b>x</b>"));
        mark.set("Width", Object::Integer(100));
        form.marks.push(mark);

        let ops = form.to_operations(Some(b"FX0"));
        assert_eq!(operators(&ops), vec!["BDC", "q", "Do", "Q", "EMC"]);
        assert!(matches!(ops[2].operands.as_slice(), [Object::Name(name)] if name == b"FX0"));
    }

    #[test]
    fn test_text_string_encoding() {
        assert!(matches!(
            text_string("abc"),
            Object::String(bytes, StringFormat::Literal) if bytes == b"abc"
        ));
        assert!(matches!(
            text_string("é"),
            Object::String(bytes, StringFormat::Hexadecimal) if bytes == [0xfe, 0xff, 0x00, 0xe9]
        ));
    }
}
