use std::str::FromStr;

use thiserror::Error;

use crate::model::{
    Annotation, Argument, Arguments, BaseTy, FunctionSchema, NativeFunction, OperatorName, Return,
    Type,
};

/// Errors raised while parsing native function declarations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{0}")]
    Message(String),
    #[error("unknown type `{0}`")]
    UnknownType(String),
}

impl SchemaError {
    fn new(msg: impl Into<String>) -> Self {
        SchemaError::Message(msg.into())
    }
}

/// Parses a declaration such as
/// `add.out(Tensor self, Tensor other, *, Scalar alpha=1, Tensor(a!) out) -> Tensor(a!)`.
///
/// Keyword-only arguments with a write annotation become out arguments.
impl FromStr for FunctionSchema {
    type Err = SchemaError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let trimmed = src.trim();
        if trimmed.is_empty() {
            return Err(SchemaError::new("declaration is empty"));
        }
        let open = trimmed
            .find('(')
            .ok_or_else(|| SchemaError::new(format!("missing `(` in `{trimmed}`")))?;
        let name = trimmed[..open].trim();
        if name.is_empty() {
            return Err(SchemaError::new(format!("missing operator name in `{trimmed}`")));
        }
        let close = matching_paren(trimmed, open)
            .ok_or_else(|| SchemaError::new(format!("unbalanced `(` in `{trimmed}`")))?;
        let args_src = &trimmed[open + 1..close];
        let rest = trimmed[close + 1..].trim();
        let returns_src = rest
            .strip_prefix("->")
            .ok_or_else(|| SchemaError::new(format!("missing `->` in `{trimmed}`")))?;

        Ok(FunctionSchema {
            name: OperatorName::parse(name),
            arguments: parse_arguments(args_src)?,
            returns: parse_returns(returns_src.trim())?,
        })
    }
}

impl NativeFunction {
    /// Parses a declaration into a composite function with the default variants.
    pub fn parse(decl: &str) -> Result<Self, SchemaError> {
        Ok(NativeFunction::new(decl.parse()?))
    }
}

fn parse_arguments(src: &str) -> Result<Arguments, SchemaError> {
    let mut arguments = Arguments::default();
    let mut kwarg_only = false;
    for piece in split_top_level(src) {
        if piece == "*" {
            kwarg_only = true;
            continue;
        }
        let arg = parse_argument(piece)?;
        if !kwarg_only {
            arguments.positional.push(arg);
        } else if arg.is_write() {
            arguments.out.push(arg);
        } else {
            arguments.kwarg_only.push(arg);
        }
    }
    Ok(arguments)
}

fn parse_argument(src: &str) -> Result<Argument, SchemaError> {
    let (decl, default) = match find_top_level(src, '=') {
        Some(idx) => (src[..idx].trim(), Some(src[idx + 1..].trim().to_string())),
        None => (src.trim(), None),
    };
    let (ty_src, name) = rsplit_top_level_whitespace(decl)
        .ok_or_else(|| SchemaError::new(format!("argument `{src}` is missing a name")))?;
    let (ty, annotation) = parse_annotated_type(ty_src.trim())?;
    Ok(Argument {
        name: name.trim().to_string(),
        ty,
        default,
        annotation,
    })
}

fn parse_returns(src: &str) -> Result<Vec<Return>, SchemaError> {
    let inner = match src.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) if matching_paren(src, 0) == Some(src.len() - 1) => inner,
        _ => return Ok(vec![parse_return(src)?]),
    };
    split_top_level(inner).into_iter().map(parse_return).collect()
}

fn parse_return(src: &str) -> Result<Return, SchemaError> {
    let src = src.trim();
    let (ty_src, name) = match rsplit_top_level_whitespace(src) {
        Some((ty, name)) => (ty, Some(name.to_string())),
        None => (src, None),
    };
    let (ty, annotation) = parse_annotated_type(ty_src)?;
    Ok(Return {
        name,
        ty,
        annotation,
    })
}

fn parse_annotated_type(src: &str) -> Result<(Type, Option<Annotation>), SchemaError> {
    let Some(open) = src.find('(') else {
        return Ok((parse_type(src)?, None));
    };
    let close = matching_paren(src, open)
        .ok_or_else(|| SchemaError::new(format!("unbalanced annotation in `{src}`")))?;
    let inner = src[open + 1..close].trim();
    let alias = inner.split("->").next().unwrap_or_default().trim();
    let annotation = Annotation {
        alias_set: alias.trim_end_matches('!').to_string(),
        is_write: alias.ends_with('!'),
    };
    let stripped = format!("{}{}", &src[..open], &src[close + 1..]);
    Ok((parse_type(stripped.trim())?, Some(annotation)))
}

fn parse_type(src: &str) -> Result<Type, SchemaError> {
    if let Some(inner) = src.strip_suffix('?') {
        return Ok(Type::optional(parse_type(inner)?));
    }
    if let Some(head) = src.strip_suffix(']') {
        let open = head
            .rfind('[')
            .ok_or_else(|| SchemaError::new(format!("unbalanced `]` in `{src}`")))?;
        let size_src = head[open + 1..].trim();
        let size = if size_src.is_empty() {
            None
        } else {
            Some(
                size_src
                    .parse::<usize>()
                    .map_err(|_| SchemaError::new(format!("invalid list size in `{src}`")))?,
            )
        };
        return Ok(Type::list(parse_type(&head[..open])?, size));
    }
    BaseTy::from_name(src)
        .map(Type::Base)
        .ok_or_else(|| SchemaError::UnknownType(src.to_string()))
}

fn matching_paren(src: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in src.char_indices().skip_while(|(idx, _)| *idx < open) {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_top_level(src: &str, needle: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (idx, ch) in src.char_indices() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            _ if ch == needle && depth == 0 => return Some(idx),
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Splits `<type> <name>` on the last whitespace outside brackets.
fn rsplit_top_level_whitespace(src: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut split = None;
    for (idx, ch) in src.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            _ if ch.is_whitespace() && depth == 0 => split = Some(idx),
            _ => {}
        }
    }
    split.map(|idx| (src[..idx].trim_end(), src[idx..].trim_start()))
}

fn split_top_level(src: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = src;
    while let Some(idx) = find_top_level(rest, ',') {
        pieces.push(rest[..idx].trim());
        rest = &rest[idx + 1..];
    }
    pieces.push(rest.trim());
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_out_overload() {
        let schema: FunctionSchema =
            "add.out(Tensor self, Tensor other, *, Scalar alpha=1, Tensor(a!) out) -> Tensor(a!)"
                .parse()
                .expect("valid declaration");
        assert_eq!(schema.name.to_string(), "add.out");
        assert_eq!(schema.arguments.positional.len(), 2);
        assert_eq!(schema.arguments.kwarg_only[0].default.as_deref(), Some("1"));
        assert_eq!(schema.arguments.out[0].name, "out");
        assert!(schema.returns[0].is_write());
        assert!(schema.is_out_fn());
    }

    #[test]
    fn parses_named_tuple_returns_and_lists() {
        let schema: FunctionSchema =
            "topk(Tensor self, int k, int dim=-1, bool largest=True, bool sorted=True) -> (Tensor values, Tensor indices)"
                .parse()
                .expect("valid declaration");
        assert_eq!(schema.returns.len(), 2);
        assert_eq!(schema.returns[1].name.as_deref(), Some("indices"));

        let schema: FunctionSchema =
            "index.Tensor(Tensor self, Tensor?[] indices) -> Tensor".parse().unwrap();
        let indices = &schema.arguments.positional[1];
        assert!(indices.ty.is_tensor_like());
        assert!(!indices.ty.is_tensor_list());

        let schema: FunctionSchema =
            "conv2d(Tensor input, Tensor weight, Tensor? bias=None, int[2] stride=[1, 1]) -> Tensor"
                .parse()
                .unwrap();
        assert_eq!(
            schema.arguments.positional[3].ty,
            Type::list(Type::base(BaseTy::Int), Some(2))
        );
        assert_eq!(schema.arguments.positional[3].default.as_deref(), Some("[1, 1]"));
    }

    #[test]
    fn parses_inplace_and_empty_returns() {
        let schema: FunctionSchema = "_foreach_add_.Scalar(Tensor(a!)[] self, Scalar scalar) -> ()"
            .parse()
            .unwrap();
        assert!(schema.name.inplace);
        assert_eq!(schema.name.base, "_foreach_add");
        assert!(schema.returns.is_empty());
        assert!(schema.arguments.positional[0].is_write());
        assert!(schema.arguments.positional[0].ty.is_tensor_list());
    }

    #[test]
    fn parses_dunder_names() {
        let iand = OperatorName::parse("__iand__.Tensor");
        assert!(iand.inplace);
        assert!(iand.dunder_method);
        assert_eq!(iand.base, "and");
        assert_eq!(iand.to_string(), "__iand__.Tensor");

        let and = OperatorName::parse("__and__.Scalar");
        assert!(!and.inplace);
        assert_eq!(and.base, "and");
        assert_eq!(and.unqualified(), "__and__");

        for name in ["__ior__", "__ixor__", "__ilshift__", "__irshift__"] {
            let parsed = OperatorName::parse(name);
            assert!(parsed.inplace, "{name}");
            assert_eq!(parsed.unqualified(), name);
        }
        assert!(!OperatorName::parse("__index__").inplace);
    }

    #[test]
    fn quoted_defaults_keep_other_quote_kind() {
        let schema: FunctionSchema =
            r#"einsum(str equation="it's, ok", Tensor[] tensors) -> Tensor"#
                .parse()
                .unwrap();
        let args = &schema.arguments.positional;
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].default.as_deref(), Some(r#""it's, ok""#));
        assert_eq!(args[1].name, "tensors");
    }

    #[test]
    fn rejects_unknown_types() {
        let err = "foo(Banana self) -> Tensor".parse::<FunctionSchema>().unwrap_err();
        assert_eq!(err, SchemaError::UnknownType("Banana".to_string()));
        assert!("foo(Tensor self)".parse::<FunctionSchema>().is_err());
    }
}
