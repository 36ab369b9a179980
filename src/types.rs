//! The type registry: value kinds, their group masks, sizes, and the short
//! name parser used by both driver bridges to translate a native declared
//! type into one of these kinds.

/// The numeric kind of a value. Stored in the low byte of a [`CompleteType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Kind {
    Unknown = 0,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Guid,
    Utf8String,
    WString,
    Utf32String,
    Binary,
    Numeric,
    Decimal,
    DateTime,
    Date,
    Time,
    Bit,
    Pointer,
}

impl Kind {
    /// The group mask that complete-types this kind (spec.md §3 "group mask").
    ///
    /// Note this says nothing about storage width: the record module packs
    /// every scalar kind but `Bool`/`Bit`/`Guid` into a shared 8-byte cell
    /// (see `record::fixed_cell_width`, the single source of truth for that
    /// concern) rather than mirroring each kind's native byte count.
    pub const fn group(self) -> Group {
        use Kind::*;
        match self {
            Unknown => Group::empty(),
            Bool => Group::BOOLEAN.union(Group::WIDTH8),
            Int8 => Group::NUMBER.union(Group::INTEGER).union(Group::SIGNED).union(Group::WIDTH8),
            Int16 => Group::NUMBER.union(Group::INTEGER).union(Group::SIGNED).union(Group::WIDTH16),
            Int32 => Group::NUMBER.union(Group::INTEGER).union(Group::SIGNED).union(Group::WIDTH32),
            Int64 => Group::NUMBER.union(Group::INTEGER).union(Group::SIGNED).union(Group::WIDTH64),
            UInt8 => Group::NUMBER.union(Group::INTEGER).union(Group::WIDTH8),
            UInt16 => Group::NUMBER.union(Group::INTEGER).union(Group::WIDTH16),
            UInt32 => Group::NUMBER.union(Group::INTEGER).union(Group::WIDTH32),
            UInt64 => Group::NUMBER.union(Group::INTEGER).union(Group::WIDTH64),
            Float32 => Group::NUMBER.union(Group::SIGNED).union(Group::WIDTH32),
            Float64 => Group::NUMBER.union(Group::SIGNED).union(Group::WIDTH64),
            Guid => Group::BINARY.union(Group::WIDTH128),
            Utf8String | WString | Utf32String => Group::STRING,
            Binary => Group::BINARY,
            Numeric => Group::NUMBER.union(Group::DECIMAL).union(Group::SIGNED),
            Decimal => Group::NUMBER.union(Group::DECIMAL).union(Group::SIGNED).union(Group::WIDTH128),
            DateTime | Date | Time => Group::DATE.union(Group::WIDTH64),
            Pointer => Group::WIDTH64,
        }
    }

    /// Combines this kind with its own group mask into a [`CompleteType`],
    /// per spec.md §3 ("a complete type").
    pub const fn complete(self) -> CompleteType {
        CompleteType((self as u32) | self.group().bits())
    }
}

/// Orthogonal bits describing a kind, OR'd onto the kind's numeric code to
/// form a [`CompleteType`]. Hand-rolled rather than built on the `bitflags`
/// crate: the corpus this crate imitates hand-rolls its own small bitmasks
/// for ODBC/FFI attribute words rather than pulling in that crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Group(u32);

impl Group {
    pub const NUMBER: Group = Group(1 << 8);
    pub const INTEGER: Group = Group(1 << 9);
    pub const DECIMAL: Group = Group(1 << 10);
    pub const SIGNED: Group = Group(1 << 11);
    pub const STRING: Group = Group(1 << 12);
    pub const DATE: Group = Group(1 << 13);
    pub const BINARY: Group = Group(1 << 14);
    pub const BOOLEAN: Group = Group(1 << 15);
    pub const WIDTH8: Group = Group(1 << 16);
    pub const WIDTH16: Group = Group(1 << 17);
    pub const WIDTH32: Group = Group(1 << 18);
    pub const WIDTH64: Group = Group(1 << 19);
    pub const WIDTH128: Group = Group(1 << 20);

    pub const fn empty() -> Self {
        Group(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Group) -> Group {
        Group(self.0 | other.0)
    }

    pub const fn contains(self, other: Group) -> bool {
        self.0 & other.0 == other.0
    }

    /// Strips the `Signed` and `Number` bits, as parameter binding does
    /// (spec.md §4.4 Variant A "Parameter binding maps the variant-view's
    /// group (after stripping Signed and Number bits) to: ...").
    pub const fn without_signed_and_number(self) -> Group {
        Group(self.0 & !(Self::SIGNED.0 | Self::NUMBER.0))
    }
}

/// A kind OR'd with its group mask (spec.md §3 "complete type").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompleteType(u32);

impl CompleteType {
    pub const fn kind(self) -> Kind {
        kind_from_code(self.0 & 0xff)
    }

    pub const fn group(self) -> Group {
        Group(self.0 & !0xff)
    }
}

/// Decodes a kind discriminant (the low byte of a [`CompleteType`], or the
/// raw `kind` header word of a derived buffer) back into a [`Kind`].
pub const fn kind_from_code(code: u32) -> Kind {
    match code & 0xff {
        0 => Kind::Unknown,
        1 => Kind::Bool,
        2 => Kind::Int8,
        3 => Kind::Int16,
        4 => Kind::Int32,
        5 => Kind::Int64,
        6 => Kind::UInt8,
        7 => Kind::UInt16,
        8 => Kind::UInt32,
        9 => Kind::UInt64,
        10 => Kind::Float32,
        11 => Kind::Float64,
        12 => Kind::Guid,
        13 => Kind::Utf8String,
        14 => Kind::WString,
        15 => Kind::Utf32String,
        16 => Kind::Binary,
        17 => Kind::Numeric,
        18 => Kind::Decimal,
        19 => Kind::DateTime,
        20 => Kind::Date,
        21 => Kind::Time,
        22 => Kind::Bit,
        23 => Kind::Pointer,
        _ => Kind::Unknown,
    }
}

/// Parses a short type name (case-insensitive, first 5 characters only, per
/// spec.md §4.4 "Common column-type mapping") into a [`CompleteType`].
/// Unknown names map to `Kind::Unknown`.
pub fn value_get_type_complete(name: &str) -> CompleteType {
    let head: String = name.chars().take(5).collect::<String>().to_ascii_uppercase();
    let kind = match head.as_str() {
        "BINAR" => Kind::Binary,
        "BOOL" | "BOOLE" => Kind::Bool,
        "DECIM" => Kind::Decimal,
        "DATE" => Kind::Date,
        "DATET" => Kind::DateTime,
        "GUID" => Kind::Guid,
        "FLOAT" => Kind::Float64,
        "INT8" => Kind::Int8,
        "INT16" => Kind::Int16,
        "INT32" => Kind::Int32,
        "INT64" => Kind::Int64,
        "UINT8" => Kind::UInt8,
        "UINT1" => Kind::UInt16,
        "UINT3" => Kind::UInt32,
        "UINT6" => Kind::UInt64,
        "NUMER" => Kind::Numeric,
        "NVARC" => Kind::WString,
        "STRIN" => Kind::Utf8String,
        "UTF8" => Kind::Utf8String,
        "UTF32" => Kind::Utf32String,
        "VARCH" => Kind::Utf8String,
        // Aliases: treated as Utf8String per spec.md §3.
        "JSON" => Kind::Utf8String,
        "XML" => Kind::Utf8String,
        "CSV" => Kind::Utf8String,
        _ => match head.as_str() {
            // Exact 4-char matches for names shorter than 5 chars that would
            // otherwise collide on the truncated prefix (e.g. "INT8" above
            // already covers the width-suffixed names; this arm covers the
            // bare width-less aliases used in some call sites).
            "INT" => Kind::Int32,
            "UINT" => Kind::UInt32,
            _ => Kind::Unknown,
        },
    };
    kind.complete()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names_case_insensitively() {
        assert_eq!(value_get_type_complete("int32").kind(), Kind::Int32);
        assert_eq!(value_get_type_complete("INT32").kind(), Kind::Int32);
        assert_eq!(value_get_type_complete("Int32Extra").kind(), Kind::Int32);
    }

    #[test]
    fn unknown_name_maps_to_unknown() {
        assert_eq!(value_get_type_complete("frobnicate").kind(), Kind::Unknown);
    }

    #[test]
    fn json_xml_csv_are_utf8_aliases() {
        assert_eq!(value_get_type_complete("json").kind(), Kind::Utf8String);
        assert_eq!(value_get_type_complete("xml").kind(), Kind::Utf8String);
        assert_eq!(value_get_type_complete("csv").kind(), Kind::Utf8String);
    }

    #[test]
    fn complete_type_round_trips_kind() {
        for kind in [Kind::Int64, Kind::Utf8String, Kind::Guid, Kind::Float64] {
            assert_eq!(kind.complete().kind(), kind);
        }
    }

    #[test]
    fn group_strips_signed_and_number() {
        let g = Kind::Int64.group();
        assert!(g.contains(Group::SIGNED));
        let stripped = g.without_signed_and_number();
        assert!(!stripped.contains(Group::SIGNED));
        assert!(!stripped.contains(Group::NUMBER));
        assert!(stripped.contains(Group::INTEGER));
    }
}
