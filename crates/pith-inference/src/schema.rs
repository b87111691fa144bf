//! Value-level schema declarations for structured calls.
//!
//! Each structured call declares the shape of the JSON it expects. The shape
//! drives three things: the deterministic hint appended to every prompt, the
//! coercion layer's field-type decisions, and final validation.

/// The declared shape of a JSON value.
#[derive(Debug, Clone)]
pub enum Shape {
    String,
    /// Whole number. Validation accepts any JSON number.
    Integer,
    Number,
    Boolean,
    /// Closed string set; values are lowercase snake_case by contract.
    Enum(&'static [&'static str]),
    Array(Box<Shape>),
    Object(Vec<Field>),
}

impl Shape {
    pub fn array(inner: Shape) -> Shape {
        Shape::Array(Box::new(inner))
    }

    pub fn object(fields: Vec<Field>) -> Shape {
        Shape::Object(fields)
    }

    /// Render a compact JSON-ish hint for this shape.
    pub fn render(&self) -> String {
        match self {
            Shape::String => "\"<string>\"".to_string(),
            Shape::Integer => "<integer>".to_string(),
            Shape::Number => "<number>".to_string(),
            Shape::Boolean => "<true|false>".to_string(),
            Shape::Enum(values) => values
                .iter()
                .map(|v| format!("\"{}\"", v))
                .collect::<Vec<_>>()
                .join(" | "),
            Shape::Array(inner) => format!("[{}, ...]", inner.render()),
            Shape::Object(fields) => {
                let body = fields
                    .iter()
                    .map(|f| format!("\"{}\": {}", f.name, f.shape.render()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{}}}", body)
            }
        }
    }
}

/// One declared object field.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
    pub required: bool,
}

impl Field {
    /// A required field.
    pub fn required(name: &'static str, shape: Shape) -> Field {
        Field {
            name,
            shape,
            required: true,
        }
    }

    /// An optional field: absent or null is accepted.
    pub fn optional(name: &'static str, shape: Shape) -> Field {
        Field {
            name,
            shape,
            required: false,
        }
    }
}

/// A declared schema for one structured call.
#[derive(Debug, Clone)]
pub struct Schema {
    pub root: Shape,
}

impl Schema {
    pub fn new(root: Shape) -> Self {
        Self { root }
    }

    /// The deterministic directive appended to every structured prompt:
    /// the rendered shape (including enum value lists) plus the JSON-only
    /// instruction.
    pub fn render_directive(&self) -> String {
        format!(
            "Return ONLY a JSON value matching this exact shape, with no code fences and no prose:\n{}",
            self.root.render()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_schema() -> Schema {
        Schema::new(Shape::object(vec![Field::required(
            "claims",
            Shape::array(Shape::object(vec![
                Field::required("claim", Shape::String),
                Field::required("type", Shape::Enum(&["principle", "rule"])),
            ])),
        )]))
    }

    #[test]
    fn renders_nested_shape() {
        let hint = claims_schema().root.render();
        assert_eq!(
            hint,
            r#"{"claims": [{"claim": "<string>", "type": "principle" | "rule"}, ...]}"#
        );
    }

    #[test]
    fn directive_includes_enum_values_and_no_fence_instruction() {
        let directive = claims_schema().render_directive();
        assert!(directive.contains("\"principle\" | \"rule\""));
        assert!(directive.contains("no code fences"));
        assert!(directive.contains("no prose"));
    }

    #[test]
    fn directive_is_deterministic() {
        assert_eq!(
            claims_schema().render_directive(),
            claims_schema().render_directive()
        );
    }

    #[test]
    fn renders_scalars() {
        assert_eq!(Shape::String.render(), "\"<string>\"");
        assert_eq!(Shape::Integer.render(), "<integer>");
        assert_eq!(Shape::Boolean.render(), "<true|false>");
        assert_eq!(Shape::array(Shape::Number).render(), "[<number>, ...]");
    }
}
