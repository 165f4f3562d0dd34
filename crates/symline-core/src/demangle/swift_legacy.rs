//! Pre-Swift-4 (`_T...`) mangling.
//!
//! The vendored Swift demangler behind `symbolic-demangle` only understands
//! the Swift 4+ manglings (`_T0`, `$S`, `$s`). Binaries built with Swift 1
//! through 3 still carry `_TF...`, `_Tt...` and friends, so those are parsed
//! here into a small node tree and printed the way the Swift 2 tools did:
//!
//! ```text
//! _TFC12Swift_Tester14ViewController11doSomethingfS0_FT_T_
//!   -> Swift_Tester.ViewController.doSomething (Swift_Tester.ViewController) -> () -> ()
//! ```
//!
//! Only what the old mangling can express is supported; specializations,
//! reabstraction thunks and anything else unknown is "not recognized".

use super::DemangleOptions;

/// Recursion limit for nested types and contexts.
const MAX_DEPTH: usize = 256;

/// Whether `symbol` uses the pre-Swift-4 mangling.
///
/// Mach-O symbol tables add one leading underscore (`__TF...`).
#[must_use]
pub(super) fn is_legacy_mangling(symbol: &str) -> bool
{
    let symbol = strip_macho_underscore(symbol);
    symbol.starts_with("_T") && !symbol.starts_with("_T0")
}

/// Demangle a pre-Swift-4 symbol, or `None` when it does not parse completely.
pub(super) fn demangle(symbol: &str, options: DemangleOptions) -> Option<String>
{
    let mangled = strip_macho_underscore(symbol).strip_prefix("_T")?;
    let mut parser = Parser::new(mangled);
    let global = parser.global()?;
    if !parser.at_end() {
        return None;
    }

    let mut printer = Printer {
        simplified: options == DemangleOptions::Simplified,
        out: String::new(),
    };
    printer.global(&global);
    Some(printer.out).filter(|name| !name.is_empty())
}

fn strip_macho_underscore(symbol: &str) -> &str
{
    symbol.strip_prefix('_').filter(|rest| rest.starts_with("_T")).unwrap_or(symbol)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NominalKind
{
    Class,
    Struct,
    Enum,
    Protocol,
    TypeAlias,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeclName
{
    Plain(String),
    Local
    {
        name: String, index: u64
    },
    Private
    {
        name: String, discriminator: String
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntityKind
{
    Function,
    Variable,
    Subscript,
    Allocator,
    Constructor,
    Destructor,
    Deallocator,
    IVarInitializer,
    IVarDestroyer,
    Accessor(&'static str),
    DefaultArgument(u64),
    VariableInitializer,
    ExplicitClosure(u64),
    ImplicitClosure(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entity
{
    kind: EntityKind,
    is_static: bool,
    context: Box<Node>,
    name: Option<DeclName>,
    ty: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement
{
    Conforms(Node, Node),
    SameType(Node, Node),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Signature
{
    counts: Vec<u64>,
    requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node
{
    Module(String),
    Nominal
    {
        kind: NominalKind,
        context: Box<Node>,
        name: DeclName,
    },
    Entity(Entity),
    Builtin(String),
    Function
    {
        attribute: Option<&'static str>,
        throws: bool,
        input: Box<Node>,
        result: Box<Node>,
    },
    BoundGeneric
    {
        base: Box<Node>,
        args: Vec<Node>,
    },
    Metatype(Box<Node>),
    ProtocolList(Vec<Node>),
    Tuple
    {
        elements: Vec<(Option<String>, Node)>,
        variadic: bool,
    },
    InOut(Box<Node>),
    Ownership(&'static str, Box<Node>),
    GenericParam
    {
        depth: u64, index: u64
    },
    AssociatedType
    {
        base: Box<Node>,
        name: String,
    },
    Generic
    {
        signature: Signature,
        ty: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Global
{
    Type(Node),
    Entity(Node),
    Described(&'static str, Node),
    FieldOffset
    {
        direct: bool, entity: Node
    },
    Conformance
    {
        label: &'static str,
        ty: Node,
        protocol: Node,
        module: Node,
    },
    Attributed(&'static str, Box<Global>),
}

struct Parser<'a>
{
    rest: &'a [u8],
    substitutions: Vec<Node>,
    depth: usize,
}

impl<'a> Parser<'a>
{
    fn new(mangled: &'a str) -> Self
    {
        Self {
            rest: mangled.as_bytes(),
            substitutions: Vec::new(),
            depth: 0,
        }
    }

    fn at_end(&self) -> bool
    {
        self.rest.is_empty()
    }

    fn peek(&self) -> Option<u8>
    {
        self.rest.first().copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8>
    {
        self.rest.get(offset).copied()
    }

    fn next(&mut self) -> Option<u8>
    {
        let (&first, rest) = self.rest.split_first()?;
        self.rest = rest;
        Some(first)
    }

    fn eat(&mut self, expected: u8) -> bool
    {
        if self.peek() == Some(expected) {
            self.rest = &self.rest[1..];
            true
        } else {
            false
        }
    }

    fn take(&mut self, len: usize) -> Option<&'a str>
    {
        if len > self.rest.len() {
            return None;
        }
        let (taken, rest) = self.rest.split_at(len);
        self.rest = rest;
        std::str::from_utf8(taken).ok()
    }

    fn enter(&mut self) -> Option<()>
    {
        if self.depth >= MAX_DEPTH {
            return None;
        }
        self.depth += 1;
        Some(())
    }

    fn leave(&mut self)
    {
        self.depth -= 1;
    }

    fn natural(&mut self) -> Option<u64>
    {
        let digits = self.rest.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let mut value = 0u64;
        for digit in self.take(digits)?.bytes() {
            value = value.checked_mul(10)?.checked_add(u64::from(digit - b'0'))?;
        }
        Some(value)
    }

    /// `_` is 0, `<n>_` is n + 1.
    fn index(&mut self) -> Option<u64>
    {
        if self.eat(b'_') {
            return Some(0);
        }
        let value = self.natural()?;
        self.eat(b'_').then_some(value.checked_add(1)?)
    }

    fn global(&mut self) -> Option<Global>
    {
        match self.peek()? {
            b't' => {
                self.next();
                Some(Global::Type(self.ty()?))
            }
            b'M' => {
                self.next();
                self.metadata()
            }
            b'W' => {
                self.next();
                self.witness()
            }
            b'T' => {
                self.next();
                let attribute = match self.next()? {
                    b'o' => "@objc ",
                    b'O' => "@nonobjc ",
                    b'D' => "dynamic ",
                    b'd' => "super ",
                    _ => return None,
                };
                Some(Global::Attributed(attribute, Box::new(self.global()?)))
            }
            _ => Some(Global::Entity(self.entity()?)),
        }
    }

    fn metadata(&mut self) -> Option<Global>
    {
        let label = match self.peek()? {
            b'a' => "type metadata accessor for ",
            b'L' => "lazy cache variable for type metadata for ",
            b'm' => "metaclass for ",
            b'n' => "nominal type descriptor for ",
            b'P' => "generic type metadata pattern for ",
            b'd' => "direct type metadata for ",
            b'p' => {
                self.next();
                return Some(Global::Described("protocol descriptor for ", self.protocol()?));
            }
            _ => return Some(Global::Described("type metadata for ", self.ty()?)),
        };
        self.next();
        Some(Global::Described(label, self.ty()?))
    }

    fn witness(&mut self) -> Option<Global>
    {
        match self.next()? {
            b'V' => Some(Global::Described("value witness table for ", self.ty()?)),
            b'o' => Some(Global::Described("witness table offset for ", self.entity()?)),
            b'v' => {
                let direct = match self.next()? {
                    b'd' => true,
                    b'i' => false,
                    _ => return None,
                };
                Some(Global::FieldOffset {
                    direct,
                    entity: self.entity()?,
                })
            }
            b'P' => self.conformance("protocol witness table for "),
            b'a' => self.conformance("protocol witness table accessor for "),
            _ => None,
        }
    }

    fn conformance(&mut self, label: &'static str) -> Option<Global>
    {
        let ty = self.ty()?;
        let protocol = self.protocol()?;
        let module = self.module()?;
        Some(Global::Conformance {
            label,
            ty,
            protocol,
            module,
        })
    }

    fn entity(&mut self) -> Option<Node>
    {
        self.enter()?;
        let entity = self.entity_inner();
        self.leave();
        entity
    }

    fn entity_inner(&mut self) -> Option<Node>
    {
        let is_static = self.eat(b'Z');
        let basic = self.peek()?;
        if matches!(basic, b'C' | b'V' | b'O') && !is_static {
            return self.nominal();
        }
        if !matches!(basic, b'F' | b'v' | b'I' | b'i') {
            return None;
        }
        self.next();

        let context = self.context()?;
        let (kind, name, has_type) = self.entity_name(basic)?;
        let ty = if has_type { Some(Box::new(self.ty()?)) } else { None };

        Some(Node::Entity(Entity {
            kind,
            is_static,
            context: Box::new(context),
            name,
            ty,
        }))
    }

    /// The part after the context: special members, accessors, or a plain name.
    fn entity_name(&mut self, basic: u8) -> Option<(EntityKind, Option<DeclName>, bool)>
    {
        let special = match self.peek()? {
            b'D' => Some((EntityKind::Deallocator, false)),
            b'd' => Some((EntityKind::Destructor, false)),
            b'e' => Some((EntityKind::IVarInitializer, false)),
            b'E' => Some((EntityKind::IVarDestroyer, false)),
            b'C' => Some((EntityKind::Allocator, true)),
            b'c' => Some((EntityKind::Constructor, true)),
            _ => None,
        };
        if let Some((kind, has_type)) = special {
            self.next();
            return Some((kind, None, has_type));
        }

        let accessor = match self.peek()? {
            b'g' | b'G' => Some("getter"),
            b's' => Some("setter"),
            b'm' => Some("materializeForSet"),
            b'w' => Some("willset"),
            b'W' => Some("didset"),
            b'a' | b'l' => None,
            _ => return self.closure_or_name(basic),
        };
        let label = match accessor {
            Some(label) => {
                self.next();
                label
            }
            None => self.addressor()?,
        };
        Some((EntityKind::Accessor(label), Some(self.decl_name()?), true))
    }

    fn addressor(&mut self) -> Option<&'static str>
    {
        let mutable = self.next()? == b'a';
        let label = match (mutable, self.next()?) {
            (true, b'u') => "unsafeMutableAddressor",
            (true, b'O') => "owningMutableAddressor",
            (true, b'o') => "nativeOwningMutableAddressor",
            (true, b'p') => "nativePinningMutableAddressor",
            (false, b'u') => "unsafeAddressor",
            (false, b'O') => "owningAddressor",
            (false, b'o') => "nativeOwningAddressor",
            (false, b'p') => "nativePinningAddressor",
            _ => return None,
        };
        Some(label)
    }

    fn closure_or_name(&mut self, basic: u8) -> Option<(EntityKind, Option<DeclName>, bool)>
    {
        if matches!(self.peek()?, b'U' | b'u') {
            let explicit = self.next()? == b'U';
            let index = self.index()?;
            let kind = if explicit {
                EntityKind::ExplicitClosure(index)
            } else {
                EntityKind::ImplicitClosure(index)
            };
            return Some((kind, None, true));
        }

        let kind = match basic {
            b'I' => {
                return match self.next()? {
                    b'A' => Some((EntityKind::DefaultArgument(self.index()?), None, false)),
                    b'i' => Some((EntityKind::VariableInitializer, None, false)),
                    _ => None,
                };
            }
            b'F' => EntityKind::Function,
            b'v' => EntityKind::Variable,
            _ => EntityKind::Subscript,
        };
        Some((kind, Some(self.decl_name()?), true))
    }

    fn context(&mut self) -> Option<Node>
    {
        match self.peek()? {
            b'S' => {
                self.next();
                self.substitution()
            }
            b'0'..=b'9' | b'X' | b'o' => self.module(),
            b'C' | b'V' | b'O' | b'F' | b'v' | b'I' | b'i' | b'Z' => self.entity(),
            b'P' => {
                self.next();
                self.protocol()
            }
            _ => None,
        }
    }

    fn module(&mut self) -> Option<Node>
    {
        if self.eat(b'S') {
            return match self.substitution()? {
                module @ Node::Module(_) => Some(module),
                _ => None,
            };
        }
        let module = Node::Module(self.identifier()?);
        self.substitutions.push(module.clone());
        Some(module)
    }

    fn nominal(&mut self) -> Option<Node>
    {
        let kind = self.next()?;
        self.nominal_of(kind)
    }

    fn nominal_of(&mut self, kind: u8) -> Option<Node>
    {
        let kind = match kind {
            b'C' => NominalKind::Class,
            b'V' => NominalKind::Struct,
            b'O' => NominalKind::Enum,
            _ => return None,
        };
        self.declaration(kind)
    }

    fn declaration(&mut self, kind: NominalKind) -> Option<Node>
    {
        let context = self.context()?;
        self.declaration_in(kind, context)
    }

    fn declaration_in(&mut self, kind: NominalKind, context: Node) -> Option<Node>
    {
        let node = Node::Nominal {
            kind,
            context: Box::new(context),
            name: self.decl_name()?,
        };
        self.substitutions.push(node.clone());
        Some(node)
    }

    /// A substitution is either the protocol itself or the module it lives in.
    fn protocol(&mut self) -> Option<Node>
    {
        if self.eat(b'S') {
            return match self.substitution()? {
                protocol @ Node::Nominal {
                    kind: NominalKind::Protocol,
                    ..
                } => Some(protocol),
                module @ Node::Module(_) => self.declaration_in(NominalKind::Protocol, module),
                _ => None,
            };
        }
        self.declaration(NominalKind::Protocol)
    }

    fn substitution(&mut self) -> Option<Node>
    {
        let known = |kind, name: &str| Node::Nominal {
            kind,
            context: Box::new(Node::Module("Swift".to_string())),
            name: DeclName::Plain(name.to_string()),
        };
        let node = match self.peek()? {
            b'o' => Node::Module("ObjectiveC".to_string()),
            b'C' => Node::Module("__C".to_string()),
            b's' => Node::Module("Swift".to_string()),
            b'a' => known(NominalKind::Struct, "Array"),
            b'b' => known(NominalKind::Struct, "Bool"),
            b'c' => known(NominalKind::Struct, "UnicodeScalar"),
            b'd' => known(NominalKind::Struct, "Double"),
            b'f' => known(NominalKind::Struct, "Float"),
            b'i' => known(NominalKind::Struct, "Int"),
            b'V' => known(NominalKind::Struct, "UnsafeRawPointer"),
            b'v' => known(NominalKind::Struct, "UnsafeMutableRawPointer"),
            b'P' => known(NominalKind::Struct, "UnsafePointer"),
            b'p' => known(NominalKind::Struct, "UnsafeMutablePointer"),
            b'q' => known(NominalKind::Enum, "Optional"),
            b'Q' => known(NominalKind::Enum, "ImplicitlyUnwrappedOptional"),
            b'R' => known(NominalKind::Struct, "UnsafeBufferPointer"),
            b'r' => known(NominalKind::Struct, "UnsafeMutableBufferPointer"),
            b'S' => known(NominalKind::Struct, "String"),
            b'u' => known(NominalKind::Struct, "UInt"),
            _ => {
                let index = usize::try_from(self.index()?).ok()?;
                return self.substitutions.get(index).cloned();
            }
        };
        self.next();
        Some(node)
    }

    fn decl_name(&mut self) -> Option<DeclName>
    {
        if self.eat(b'L') {
            let index = self.index()?;
            return Some(DeclName::Local {
                name: self.identifier()?,
                index,
            });
        }
        if self.eat(b'P') {
            let discriminator = self.identifier()?;
            return Some(DeclName::Private {
                name: self.identifier()?,
                discriminator,
            });
        }
        Some(DeclName::Plain(self.identifier()?))
    }

    fn identifier(&mut self) -> Option<String>
    {
        if self.eat(b'X') {
            let len = usize::try_from(self.natural()?).ok()?;
            return decode_punycode(self.take(len)?);
        }
        if self.eat(b'o') {
            let fixity = match self.next()? {
                b'p' => "prefix",
                b'P' => "postfix",
                b'i' => "infix",
                _ => return None,
            };
            let len = usize::try_from(self.natural()?).ok()?;
            let operator = self.take(len)?.bytes().map(operator_char).collect::<Option<String>>()?;
            return Some(format!("{operator} {fixity}"));
        }
        let len = usize::try_from(self.natural()?).ok()?;
        self.take(len).map(str::to_string)
    }

    fn ty(&mut self) -> Option<Node>
    {
        self.enter()?;
        let ty = self.ty_inner();
        self.leave();
        ty
    }

    fn ty_inner(&mut self) -> Option<Node>
    {
        match self.next()? {
            b'B' => self.builtin(),
            b'a' => self.declaration(NominalKind::TypeAlias),
            b'b' => self.function(Some("@convention(block) ")),
            b'c' => self.function(Some("@convention(c) ")),
            b'K' => self.function(Some("@autoclosure ")),
            b'F' | b'f' => self.function(None),
            b'G' => {
                let base = self.ty()?;
                let mut args = Vec::new();
                while !self.eat(b'_') {
                    args.push(self.ty()?);
                }
                if args.is_empty() {
                    return None;
                }
                Some(Node::BoundGeneric {
                    base: Box::new(base),
                    args,
                })
            }
            b'M' => Some(Node::Metatype(Box::new(self.ty()?))),
            b'P' => {
                let mut protocols = Vec::new();
                while !self.eat(b'_') {
                    protocols.push(self.protocol()?);
                }
                Some(Node::ProtocolList(protocols))
            }
            b'Q' | b'q' => self.generic_param(),
            b'x' => Some(Node::GenericParam { depth: 0, index: 0 }),
            b'R' => Some(Node::InOut(Box::new(self.ty()?))),
            b'S' => self.substitution(),
            b'T' => self.tuple(false),
            b't' => self.tuple(true),
            b'u' => {
                let signature = self.signature()?;
                Some(Node::Generic {
                    signature,
                    ty: Box::new(self.ty()?),
                })
            }
            b'w' => {
                let base = self.generic_param()?;
                Some(Node::AssociatedType {
                    base: Box::new(base),
                    name: self.identifier()?,
                })
            }
            b'X' => {
                let label = match self.next()? {
                    b'o' => "unowned",
                    b'u' => "unowned(unsafe)",
                    b'w' => "weak",
                    _ => return None,
                };
                Some(Node::Ownership(label, Box::new(self.ty()?)))
            }
            kind @ (b'C' | b'V' | b'O') => self.nominal_of(kind),
            _ => None,
        }
    }

    fn builtin(&mut self) -> Option<Node>
    {
        let name = match self.next()? {
            b'b' => "BridgeObject".to_string(),
            b'B' => "UnsafeValueBuffer".to_string(),
            b'O' => "UnknownObject".to_string(),
            b'o' => "NativeObject".to_string(),
            b'p' => "RawPointer".to_string(),
            b'w' => "Word".to_string(),
            b'f' => format!("Float{}", self.sized()?),
            b'i' => format!("Int{}", self.sized()?),
            b'v' => {
                let count = self.natural()?;
                let Node::Builtin(element) = self.builtin_after_b()? else {
                    return None;
                };
                format!("Vec{count}x{element}")
            }
            _ => return None,
        };
        Some(Node::Builtin(name))
    }

    fn builtin_after_b(&mut self) -> Option<Node>
    {
        if !self.eat(b'B') {
            return None;
        }
        self.builtin()
    }

    fn sized(&mut self) -> Option<u64>
    {
        let bits = self.natural()?;
        self.eat(b'_').then_some(bits)
    }

    fn function(&mut self, attribute: Option<&'static str>) -> Option<Node>
    {
        let throws = self.eat(b'z');
        let input = self.ty()?;
        let result = self.ty()?;
        Some(Node::Function {
            attribute,
            throws,
            input: Box::new(input),
            result: Box::new(result),
        })
    }

    fn tuple(&mut self, variadic: bool) -> Option<Node>
    {
        let mut elements = Vec::new();
        while !self.eat(b'_') {
            let labeled = match self.peek()? {
                b'0'..=b'9' => true,
                b'X' => self.peek_at(1).is_some_and(|b| b.is_ascii_digit()),
                _ => false,
            };
            let label = if labeled { Some(self.identifier()?) } else { None };
            elements.push((label, self.ty()?));
        }
        Some(Node::Tuple { elements, variadic })
    }

    fn generic_param(&mut self) -> Option<Node>
    {
        if self.eat(b'x') {
            return Some(Node::GenericParam { depth: 0, index: 0 });
        }
        if self.eat(b'd') {
            let depth = self.index()?.checked_add(1)?;
            let index = self.index()?;
            return Some(Node::GenericParam { depth, index });
        }
        let index = self.index()?.checked_add(1)?;
        Some(Node::GenericParam { depth: 0, index })
    }

    fn signature(&mut self) -> Option<Signature>
    {
        let mut counts = Vec::new();
        while !matches!(self.peek()?, b'R' | b'r') {
            let count = if self.eat(b'z') { 0 } else { self.index()?.checked_add(1)? };
            counts.push(count);
        }
        if counts.is_empty() {
            counts.push(1);
        }

        let mut requirements = Vec::new();
        if self.eat(b'R') {
            while !self.eat(b'r') {
                let subject = self.ty()?;
                let requirement = if self.eat(b'z') {
                    Requirement::SameType(subject, self.ty()?)
                } else {
                    Requirement::Conforms(subject, self.ty()?)
                };
                requirements.push(requirement);
            }
        } else if !self.eat(b'r') {
            return None;
        }

        Some(Signature { counts, requirements })
    }
}

/// Swift's operator character encoding.
fn operator_char(code: u8) -> Option<char>
{
    let op = match code {
        b'a' => '&',
        b'c' => '@',
        b'd' => '/',
        b'e' => '=',
        b'g' => '>',
        b'l' => '<',
        b'm' => '*',
        b'n' => '!',
        b'o' => '|',
        b'p' => '+',
        b'q' => '?',
        b'r' => '%',
        b's' => '-',
        b't' => '~',
        b'x' => '^',
        b'z' => '.',
        _ => return None,
    };
    Some(op)
}

/// Generic parameter names: `A`..`Z`, then `BA`.., with the depth appended.
fn generic_param_name(depth: u64, mut index: u64) -> String
{
    let mut name = String::new();
    loop {
        let letter = u8::try_from(index % 26).unwrap_or(0);
        name.push(char::from(b'A' + letter));
        index /= 26;
        if index == 0 {
            break;
        }
    }
    if depth != 0 {
        name.push_str(&depth.to_string());
    }
    name
}

const PUNY_BASE: u32 = 36;
const PUNY_TMIN: u32 = 1;
const PUNY_TMAX: u32 = 26;
const PUNY_SKEW: u32 = 38;
const PUNY_DAMP: u32 = 700;

/// RFC 3492 Punycode with Swift's alphabet: `_` delimits, digits 26..35 are `A`..`J`.
fn decode_punycode(encoded: &str) -> Option<String>
{
    let (basic, extended) = match encoded.rfind('_') {
        Some(pos) => (&encoded[..pos], &encoded[pos + 1..]),
        None => ("", encoded),
    };
    if !basic.is_ascii() {
        return None;
    }

    let mut output: Vec<char> = basic.chars().collect();
    let mut code_point = 128u32;
    let mut bias = 72u32;
    let mut position = 0u32;
    let mut digits = extended.bytes().peekable();

    while digits.peek().is_some() {
        let old_position = position;
        let mut weight = 1u32;
        let mut k = PUNY_BASE;
        loop {
            let digit = match digits.next()? {
                letter @ b'a'..=b'z' => u32::from(letter - b'a'),
                letter @ b'A'..=b'J' => u32::from(letter - b'A') + 26,
                _ => return None,
            };
            position = position.checked_add(digit.checked_mul(weight)?)?;
            let threshold = if k <= bias {
                PUNY_TMIN
            } else if k >= bias + PUNY_TMAX {
                PUNY_TMAX
            } else {
                k - bias
            };
            if digit < threshold {
                break;
            }
            weight = weight.checked_mul(PUNY_BASE - threshold)?;
            k += PUNY_BASE;
        }

        let len = u32::try_from(output.len() + 1).ok()?;
        bias = adapt_bias(position - old_position, len, old_position == 0);
        code_point = code_point.checked_add(position / len)?;
        position %= len;
        output.insert(usize::try_from(position).ok()?, char::from_u32(code_point)?);
        position += 1;
    }

    Some(output.into_iter().collect())
}

fn adapt_bias(delta: u32, points: u32, first: bool) -> u32
{
    let mut delta = if first { delta / PUNY_DAMP } else { delta / 2 };
    delta += delta / points;
    let mut k = 0;
    while delta > ((PUNY_BASE - PUNY_TMIN) * PUNY_TMAX) / 2 {
        delta /= PUNY_BASE - PUNY_TMIN;
        k += PUNY_BASE;
    }
    k + ((PUNY_BASE - PUNY_TMIN + 1) * delta) / (delta + PUNY_SKEW)
}

/// Prints nodes in the Swift 2 style. Simplified output drops module names
/// and entity types.
struct Printer
{
    simplified: bool,
    out: String,
}

impl Printer
{
    fn global(&mut self, global: &Global)
    {
        match global {
            Global::Type(ty) => self.ty(ty),
            Global::Entity(entity) => self.ty(entity),
            Global::Described(label, node) => {
                self.out.push_str(label);
                self.ty(node);
            }
            Global::FieldOffset { direct, entity } => {
                self.out
                    .push_str(if *direct { "direct field offset for " } else { "indirect field offset for " });
                self.ty(entity);
            }
            Global::Conformance {
                label,
                ty,
                protocol,
                module,
            } => {
                self.out.push_str(label);
                self.ty(ty);
                self.out.push_str(" : ");
                self.ty(protocol);
                if !self.simplified {
                    self.out.push_str(" in ");
                    self.ty(module);
                }
            }
            Global::Attributed(attribute, inner) => {
                self.out.push_str(attribute);
                self.global(inner);
            }
        }
    }

    /// Print `context.` when the context prints anything at all.
    fn qualifier(&mut self, context: &Node)
    {
        let start = self.out.len();
        self.context(context);
        if self.out.len() > start {
            self.out.push('.');
        }
    }

    fn context(&mut self, context: &Node)
    {
        match context {
            Node::Module(name) => {
                if !self.simplified {
                    self.out.push_str(name);
                }
            }
            Node::Entity(entity) => {
                self.qualifier(&entity.context);
                if self.simplified {
                    self.entity_name(entity);
                } else {
                    self.out.push('(');
                    self.entity_name(entity);
                    self.entity_type(entity);
                    self.out.push(')');
                }
            }
            other => self.ty(other),
        }
    }

    fn decl_name(&mut self, name: &DeclName)
    {
        match name {
            DeclName::Plain(name) => self.out.push_str(name),
            DeclName::Local { name, index } => {
                if self.simplified {
                    self.out.push_str(name);
                } else {
                    self.out.push_str(&format!("({name} #{})", index + 1));
                }
            }
            DeclName::Private { name, discriminator } => {
                if self.simplified {
                    self.out.push_str(name);
                } else {
                    self.out.push_str(&format!("({name} in {discriminator})"));
                }
            }
        }
    }

    fn entity(&mut self, entity: &Entity)
    {
        if entity.is_static {
            self.out.push_str("static ");
        }
        self.qualifier(&entity.context);
        self.entity_name(entity);
        self.entity_type(entity);
    }

    fn entity_name(&mut self, entity: &Entity)
    {
        if let Some(name) = &entity.name {
            self.decl_name(name);
        }
        let suffix = match &entity.kind {
            EntityKind::Function | EntityKind::Variable | EntityKind::Subscript => return,
            EntityKind::Accessor(label) => {
                self.out.push('.');
                self.out.push_str(label);
                return;
            }
            EntityKind::Allocator => "__allocating_init".to_string(),
            EntityKind::Constructor => "init".to_string(),
            EntityKind::Destructor => "deinit".to_string(),
            EntityKind::Deallocator => "__deallocating_deinit".to_string(),
            EntityKind::IVarInitializer => "__ivar_initializer".to_string(),
            EntityKind::IVarDestroyer => "__ivar_destroyer".to_string(),
            EntityKind::DefaultArgument(index) => format!("(default argument {index})"),
            EntityKind::VariableInitializer => "(variable initialization expression)".to_string(),
            EntityKind::ExplicitClosure(index) => format!("(closure #{})", index + 1),
            EntityKind::ImplicitClosure(index) => format!("(implicit closure #{})", index + 1),
        };
        self.out.push_str(&suffix);
    }

    fn entity_type(&mut self, entity: &Entity)
    {
        if self.simplified || matches!(entity.kind, EntityKind::ExplicitClosure(_) | EntityKind::ImplicitClosure(_)) {
            return;
        }
        let Some(ty) = &entity.ty else {
            return;
        };
        if is_function_like(ty) {
            self.out.push(' ');
        } else {
            self.out.push_str(" : ");
        }
        self.ty(ty);
    }

    fn ty(&mut self, node: &Node)
    {
        match node {
            Node::Module(name) => self.out.push_str(name),
            Node::Nominal { context, name, .. } => {
                self.qualifier(context);
                self.decl_name(name);
            }
            Node::Entity(entity) => self.entity(entity),
            Node::Builtin(name) => {
                self.out.push_str("Builtin.");
                self.out.push_str(name);
            }
            Node::Function {
                attribute,
                throws,
                input,
                result,
            } => {
                if let Some(attribute) = attribute {
                    self.out.push_str(attribute);
                }
                if matches!(**input, Node::Tuple { .. }) {
                    self.ty(input);
                } else {
                    self.out.push('(');
                    self.ty(input);
                    self.out.push(')');
                }
                if *throws {
                    self.out.push_str(" throws");
                }
                self.out.push_str(" -> ");
                self.ty(result);
            }
            Node::BoundGeneric { base, args } => {
                self.ty(base);
                self.out.push('<');
                self.list(args);
                self.out.push('>');
            }
            Node::Metatype(instance) => {
                if is_function_like(instance) {
                    self.out.push('(');
                    self.ty(instance);
                    self.out.push(')');
                } else {
                    self.ty(instance);
                }
                self.out.push_str(".Type");
            }
            Node::ProtocolList(protocols) => match protocols.as_slice() {
                [single] => self.ty(single),
                _ => {
                    self.out.push_str("protocol<");
                    self.list(protocols);
                    self.out.push('>');
                }
            },
            Node::Tuple { elements, variadic } => self.tuple(elements, *variadic),
            Node::InOut(inner) => {
                self.out.push_str("inout ");
                self.ty(inner);
            }
            Node::Ownership(label, inner) => {
                self.out.push_str(label);
                self.out.push(' ');
                self.ty(inner);
            }
            Node::GenericParam { depth, index } => self.out.push_str(&generic_param_name(*depth, *index)),
            Node::AssociatedType { base, name } => {
                self.ty(base);
                self.out.push('.');
                self.out.push_str(name);
            }
            Node::Generic { signature, ty } => {
                self.signature(signature);
                self.out.push(' ');
                self.ty(ty);
            }
        }
    }

    fn list(&mut self, nodes: &[Node])
    {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.ty(node);
        }
    }

    fn tuple(&mut self, elements: &[(Option<String>, Node)], variadic: bool)
    {
        self.out.push('(');
        for (i, (label, ty)) in elements.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            if let Some(label) = label {
                self.out.push_str(label);
                self.out.push_str(" : ");
            }
            self.ty(ty);
            if variadic && i + 1 == elements.len() {
                self.out.push_str("...");
            }
        }
        self.out.push(')');
    }

    fn signature(&mut self, signature: &Signature)
    {
        let params: Vec<String> = signature
            .counts
            .iter()
            .zip(0u64..)
            .flat_map(|(&count, depth)| (0..count).map(move |index| generic_param_name(depth, index)))
            .collect();
        self.out.push('<');
        self.out.push_str(&params.join(", "));
        for (i, requirement) in signature.requirements.iter().enumerate() {
            self.out.push_str(if i == 0 { " where " } else { ", " });
            let (subject, relation, constraint) = match requirement {
                Requirement::Conforms(subject, constraint) => (subject, " : ", constraint),
                Requirement::SameType(subject, constraint) => (subject, " == ", constraint),
            };
            self.ty(subject);
            self.out.push_str(relation);
            self.ty(constraint);
        }
        self.out.push('>');
    }
}

fn is_function_like(node: &Node) -> bool
{
    match node {
        Node::Function { .. } => true,
        Node::Generic { ty, .. } => is_function_like(ty),
        _ => false,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn full(symbol: &str) -> Option<String>
    {
        demangle(symbol, DemangleOptions::Full)
    }

    fn simplified(symbol: &str) -> Option<String>
    {
        demangle(symbol, DemangleOptions::Simplified)
    }

    #[test]
    fn test_method_with_uncurried_self()
    {
        let raw = "_TFC12Swift_Tester14ViewController11doSomethingfS0_FT_T_";
        assert_eq!(
            full(raw).as_deref(),
            Some("Swift_Tester.ViewController.doSomething (Swift_Tester.ViewController) -> () -> ()")
        );
        assert_eq!(simplified(raw).as_deref(), Some("ViewController.doSomething"));
        assert_eq!(full(&format!("_{raw}")), full(raw));
    }

    #[test]
    fn test_standalone_types()
    {
        assert_eq!(full("_TtC4Test7MyClass").as_deref(), Some("Test.MyClass"));
        assert_eq!(simplified("_TtC4Test7MyClass").as_deref(), Some("MyClass"));
        assert_eq!(full("_TtSi").as_deref(), Some("Swift.Int"));
        assert_eq!(full("_TtGSqSS_").as_deref(), Some("Swift.Optional<Swift.String>"));
        assert_eq!(full("_TtBi32_").as_deref(), Some("Builtin.Int32"));
        assert_eq!(full("_TtBv4Bi8_").as_deref(), Some("Builtin.Vec4xInt8"));
        assert_eq!(full("_TtMSi").as_deref(), Some("Swift.Int.Type"));
        assert_eq!(full("_TtRSi").as_deref(), Some("inout Swift.Int"));
        assert_eq!(full("_TtT3fooSi3barSu_").as_deref(), Some("(foo : Swift.Int, bar : Swift.UInt)"));
        assert_eq!(full("_TttSiSu_").as_deref(), Some("(Swift.Int, Swift.UInt...)"));
        assert_eq!(full("_TtbT_T_").as_deref(), Some("@convention(block) () -> ()"));
        assert_eq!(full("_TtXwC10swift_ired5Frame").as_deref(), Some("weak swift_ired.Frame"));
    }

    #[test]
    fn test_protocol_lists_reuse_substitutions()
    {
        assert_eq!(full("_TtP_").as_deref(), Some("protocol<>"));
        assert_eq!(full("_TtP3foo3bar_").as_deref(), Some("foo.bar"));
        assert_eq!(
            full("_TtTP3foo3barS_3bas_PS1__PS1_S_3zimS0___").as_deref(),
            Some("(protocol<foo.bar, foo.bas>, foo.bas, protocol<foo.bas, foo.zim, foo.bar>)")
        );
    }

    #[test]
    fn test_entities_and_accessors()
    {
        assert_eq!(full("_TFC3foo3bar3basfT3zimCS_3zim_T_").as_deref(), Some("foo.bar.bas (zim : foo.zim) -> ()"));
        assert_eq!(full("_TToFC3foo3bar3basfT3zimCS_3zim_T_").as_deref(), Some("@objc foo.bar.bas (zim : foo.zim) -> ()"));
        assert_eq!(full("_TF3foog3barSi").as_deref(), Some("foo.bar.getter : Swift.Int"));
        assert_eq!(full("_TFC3foo3bars3basSi").as_deref(), Some("foo.bar.bas.setter : Swift.Int"));
        assert_eq!(full("_Tv3foo3barSi").as_deref(), Some("foo.bar : Swift.Int"));
        assert_eq!(full("_TFC3foo3barD").as_deref(), Some("foo.bar.__deallocating_deinit"));
        assert_eq!(full("_TFC3foo3bard").as_deref(), Some("foo.bar.deinit"));
        assert_eq!(full("_TMaC3foo3bar").as_deref(), Some("type metadata accessor for foo.bar"));
        assert_eq!(
            full("_TWvdvC3foo3bar3basSi").as_deref(),
            Some("direct field offset for foo.bar.bas : Swift.Int")
        );
        assert_eq!(
            full("_TIF1t1fFT1iSi1sSS_T_A_").as_deref(),
            Some("t.(f (i : Swift.Int, s : Swift.String) -> ()).(default argument 0)")
        );
    }

    #[test]
    fn test_operators_and_punycode()
    {
        assert_eq!(full("_TF8manglingoi2qqFTSiSi_T_").as_deref(), Some("mangling.?? infix (Swift.Int, Swift.Int) -> ()"));
        assert_eq!(
            full("_TF8manglingX24ihqwcrbEcvIaIdqgAFGpqjyeFT_T_").as_deref(),
            Some("mangling.他们为什么不说中文 () -> ()")
        );
    }

    #[test]
    fn test_generic_signatures()
    {
        assert_eq!(full("_TturFxx").as_deref(), Some("<A> (A) -> A"));
        assert_eq!(full("_TtuzrFT_T_").as_deref(), Some("<> () -> ()"));
        assert_eq!(full("_Ttu__rFxqd__").as_deref(), Some("<A, A1> (A) -> A1"));
    }

    #[test]
    fn test_rejects_everything_else()
    {
        for symbol in [
            "",
            "_some_name",
            "some_other_name",
            "main",
            "_T",
            "_TtC4Test",
            "_TtC4Test7MyClassTrailing",
            "_TtS9_",
            "_TTSg5Si___TFSa6appendfxT_",
        ] {
            assert_eq!(full(symbol), None, "{symbol:?}");
        }
        assert!(!is_legacy_mangling("_T0s5Int32V"));
        assert!(is_legacy_mangling("__TtSi"));
    }

    #[test]
    fn test_deep_nesting_is_bounded()
    {
        let symbol = format!("_Tt{}Si", "M".repeat(MAX_DEPTH * 2));
        assert_eq!(full(&symbol), None);
    }
}
