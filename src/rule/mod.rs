//! Rule compiler (C2): parses a rule string into the 65 536-entry lookup
//! table the leaf engine (C3) applies to every overlapping 4x4 sub-square.

mod tables;

use crate::error::EngineError;
use tables::{table_for_count, HEX_MASK, LETTER_ORDER, VON_NEUMANN_MASK};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbourhood {
    Moore,
    Hex,
    VonNeumann,
}

impl Neighbourhood {
    fn suffix(self) -> &'static str {
        match self {
            Neighbourhood::Moore => "",
            Neighbourhood::Hex => "H",
            Neighbourhood::VonNeumann => "V",
        }
    }

    fn degree(self) -> u8 {
        match self {
            Neighbourhood::Moore => 8,
            Neighbourhood::Hex => 6,
            Neighbourhood::VonNeumann => 4,
        }
    }

    fn mask(self) -> u8 {
        match self {
            Neighbourhood::Moore => 0xff,
            Neighbourhood::Hex => HEX_MASK,
            Neighbourhood::VonNeumann => VON_NEUMANN_MASK,
        }
    }
}

/// The `:T<width>,<height>` bounded-grid suffix. Parsed and round-tripped,
/// but the hashed engine's recursion does not implement wraparound — see
/// the corresponding entry in `DESIGN.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedGrid {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// The suffix text verbatim, after the leading `:`, for round-tripping
    /// topology modifiers (`*`-prefixed torus/Klein-bottle markers) this
    /// crate does not otherwise interpret.
    pub raw: String,
}

#[derive(Clone)]
pub struct CompiledRule {
    pub canonical: String,
    pub neighbourhood: Neighbourhood,
    pub bounded: Option<BoundedGrid>,
    /// `table[pattern]` packs the inner 2x2 one-generation-forward result
    /// into the low 4 bits: bit3=nw, bit2=ne, bit1=sw, bit0=se. `pattern` is
    /// a 4x4 bitmap, MSB (`0x8000`) at the NW corner, row-major.
    pub table: Box<[u8; 65536]>,
}

impl std::fmt::Debug for CompiledRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRule")
            .field("canonical", &self.canonical)
            .field("neighbourhood", &self.neighbourhood)
            .field("bounded", &self.bounded)
            .finish()
    }
}

#[derive(Debug, Clone)]
enum Selection {
    Full,
    Letters(Vec<char>),
    AllExcept(Vec<char>),
}

fn parse_side(s: &str, digit_cap: u8) -> Result<Vec<(u8, Selection)>, EngineError> {
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    let mut entries = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        if !c.is_ascii_digit() {
            return Err(EngineError::rule_parse(format!(
                "unexpected character `{c}` where a neighbour count was expected"
            )));
        }
        let count = c.to_digit(10).unwrap() as u8;
        if count > digit_cap {
            return Err(EngineError::rule_parse(format!(
                "neighbour count {count} exceeds the neighbourhood degree {digit_cap}"
            )));
        }
        i += 1;
        let mut negate = false;
        let mut letters = Vec::new();
        if i < chars.len() && chars[i] == '-' {
            negate = true;
            i += 1;
        }
        while i < chars.len() && LETTER_ORDER.contains(&chars[i]) {
            letters.push(chars[i]);
            i += 1;
        }
        if letters.is_empty() {
            if negate {
                return Err(EngineError::rule_parse("`-` with no following letters"));
            }
            entries.push((count, Selection::Full));
        } else if negate {
            entries.push((count, Selection::AllExcept(letters)));
        } else {
            entries.push((count, Selection::Letters(letters)));
        }
    }
    Ok(entries)
}

fn build_side_mask(
    entries: &[(u8, Selection)],
    neighbourhood: Neighbourhood,
) -> Result<[bool; 256], EngineError> {
    let mut mask = [false; 256];
    match neighbourhood {
        Neighbourhood::Moore => {
            for (count, sel) in entries {
                let classes = table_for_count(*count);
                match sel {
                    Selection::Full => {
                        for p in 0..=255u16 {
                            if (p as u8).count_ones() as u8 == *count {
                                mask[p as usize] = true;
                            }
                        }
                    }
                    Selection::Letters(letters) => {
                        for l in letters {
                            let (_, masks) = classes
                                .iter()
                                .find(|(c, _)| c == l)
                                .ok_or_else(|| {
                                    EngineError::rule_parse(format!(
                                        "letter `{l}` is not valid for neighbour count {count}"
                                    ))
                                })?;
                            for &m in *masks {
                                mask[m as usize] = true;
                            }
                        }
                    }
                    Selection::AllExcept(letters) => {
                        let mut excluded = Vec::new();
                        for l in letters {
                            let (_, masks) = classes
                                .iter()
                                .find(|(c, _)| c == l)
                                .ok_or_else(|| {
                                    EngineError::rule_parse(format!(
                                        "letter `{l}` is not valid for neighbour count {count}"
                                    ))
                                })?;
                            excluded.extend_from_slice(masks);
                        }
                        for p in 0..=255u16 {
                            let p = p as u8;
                            if p.count_ones() as u8 == *count && !excluded.contains(&p) {
                                mask[p as usize] = true;
                            }
                        }
                    }
                }
            }
        }
        Neighbourhood::Hex | Neighbourhood::VonNeumann => {
            let nmask = neighbourhood.mask();
            for (count, sel) in entries {
                if !matches!(sel, Selection::Full) {
                    return Err(EngineError::rule_parse(
                        "isotropic non-totalistic letters require the Moore neighbourhood",
                    ));
                }
                for p in 0..=255u16 {
                    let p = p as u8;
                    if (p & nmask).count_ones() as u8 == *count {
                        mask[p as usize] = true;
                    }
                }
            }
        }
    }
    Ok(mask)
}

/// Rebuild a canonical rule-string side (`B...` or `S...`) purely from the
/// resulting membership mask, independent of how it was originally spelled
/// — this is what makes `set_rule("s23/b3")` echo back `"B3/S23"`.
fn canonicalize_side(mask: &[bool; 256], neighbourhood: Neighbourhood) -> String {
    let mut out = String::new();
    let degree = neighbourhood.degree();
    match neighbourhood {
        Neighbourhood::Moore => {
            for count in 0..=8u8 {
                let classes = table_for_count(count);
                let present: Vec<char> = classes
                    .iter()
                    .filter(|(_, masks)| masks.iter().all(|&m| mask[m as usize]))
                    .map(|(c, _)| *c)
                    .collect();
                if present.is_empty() {
                    continue;
                }
                out.push_str(&count.to_string());
                if present.len() < classes.len() {
                    let total: usize = classes.len();
                    if present.len() * 2 <= total {
                        for c in LETTER_ORDER.iter().filter(|c| present.contains(c)) {
                            out.push(*c);
                        }
                    } else {
                        out.push('-');
                        for (c, _) in classes.iter() {
                            if !present.contains(c) {
                                out.push(*c);
                            }
                        }
                    }
                }
            }
        }
        Neighbourhood::Hex | Neighbourhood::VonNeumann => {
            let nmask = neighbourhood.mask();
            for count in 0..=degree {
                let any = (0..=255u16).any(|p| {
                    let p = p as u8;
                    (p & nmask).count_ones() as u8 == count && mask[p as usize]
                });
                if any {
                    out.push_str(&count.to_string());
                }
            }
        }
    }
    out
}

fn parse_bounds(suffix: &str) -> Result<BoundedGrid, EngineError> {
    // `:T<width>,<height>` with an optional topology-modifying tail.
    // Parse the numeric pair tolerantly and keep everything else verbatim
    // for round-tripping.
    let body = suffix.strip_prefix('T').unwrap_or(suffix);
    let mut parts = body.splitn(2, ',');
    let width = parts.next().and_then(|s| {
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    });
    let height = parts.next().and_then(|s| {
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    });
    Ok(BoundedGrid {
        width,
        height,
        raw: suffix.to_string(),
    })
}

fn build_table(b_mask: &[bool; 256], s_mask: &[bool; 256]) -> Box<[u8; 65536]> {
    // For every 4x4 input bitmap (MSB=NW, row-major), evaluate the four
    // inner cells against `b_mask`/`s_mask` using the bit convention in
    // `tables.rs` (bit7=NW .. bit0=SE of the 3x3 neighbourhood excluding
    // the centre cell).
    let mut table = Box::new([0u8; 65536]);
    for pattern in 0u32..=0xffff {
        let get = |row: i32, col: i32| -> bool {
            if !(0..4).contains(&row) || !(0..4).contains(&col) {
                false
            } else {
                let bit_index = 15 - (row * 4 + col);
                (pattern >> bit_index) & 1 == 1
            }
        };
        let mut result: u8 = 0;
        // Inner cells are at (1,1)=nw, (1,2)=ne, (2,1)=sw, (2,2)=se of the
        // 4x4, each contributing to the corresponding bit of the 2x2
        // output (bit3=nw, bit2=ne, bit1=sw, bit0=se).
        let cells = [(1i32, 1i32, 3u8), (1, 2, 2), (2, 1, 1), (2, 2, 0)];
        for (row, col, out_bit) in cells {
            let alive = get(row, col);
            let nbhd: u8 = (get(row - 1, col - 1) as u8) << 7
                | (get(row - 1, col) as u8) << 6
                | (get(row - 1, col + 1) as u8) << 5
                | (get(row, col - 1) as u8) << 4
                | (get(row, col + 1) as u8) << 3
                | (get(row + 1, col - 1) as u8) << 2
                | (get(row + 1, col) as u8) << 1
                | (get(row + 1, col + 1) as u8);
            let next_alive = if alive { s_mask[nbhd as usize] } else { b_mask[nbhd as usize] };
            if next_alive {
                result |= 1 << out_bit;
            }
        }
        table[pattern as usize] = result;
    }
    table
}

/// Apply the B0-with-Smax duality transform (§4.1) if the rule has a live
/// background. Returns `Err(UnsupportedByHashed)` if B0 fires without the
/// Smax partner.
fn apply_b0_smax(table: &mut [u8; 65536], canonical: &str) -> Result<bool, EngineError> {
    let b0_fires = table[0x0000] != 0;
    let smax_dies = table[0xffff] == 0;
    if b0_fires && !smax_dies {
        return Err(EngineError::UnsupportedByHashed(canonical.to_string()));
    }
    if !b0_fires {
        return Ok(false);
    }
    let mut flipped = Box::new([0u8; 65536]);
    for i in 0..=0xffffu32 {
        let src = (!i) & 0xffff;
        flipped[i as usize] = (!table[src as usize]) & 0xf;
    }
    *table = *flipped;
    Ok(true)
}

fn decode_map(data: &str, canonical_prefix: &mut String) -> Result<(Neighbourhood, [bool; 256], [bool; 256]), EngineError> {
    let padded = data.trim_end_matches('=');
    let bytes = base64::decode(padded.as_bytes())
        .or_else(|_| base64::decode(data.as_bytes()))
        .map_err(|e| EngineError::rule_parse(format!("invalid MAP base64: {e}")))?;
    let bit_len = bytes.len() * 8;
    let neighbourhood = match bit_len {
        n if n >= 512 => Neighbourhood::Moore,
        n if n >= 128 => Neighbourhood::Hex,
        n if n >= 32 => Neighbourhood::VonNeumann,
        _ => return Err(EngineError::rule_parse("MAP data too short")),
    };
    let degree = neighbourhood.degree();
    let expected_bits = 1usize << (degree + 1);
    if bit_len < expected_bits {
        return Err(EngineError::rule_parse("MAP data too short for inferred neighbourhood"));
    }
    let bit_at = |i: usize| -> bool { (bytes[i / 8] >> (i % 8)) & 1 == 1 };
    // Compress the active bits of the neighbourhood mask into a contiguous
    // low-order value, preserving bit order, so table index space matches
    // `2^(degree+1)` exactly.
    let nmask = neighbourhood.mask();
    let active_bits: Vec<u8> = (0..8u8).rev().filter(|b| (nmask >> b) & 1 == 1).collect();
    let mut b_mask = [false; 256];
    let mut s_mask = [false; 256];
    for p in 0..=255u16 {
        let p = p as u8;
        if p & !nmask != 0 {
            continue; // only canonical (masked) patterns are meaningful
        }
        let mut compressed = 0usize;
        for (slot, &bitpos) in active_bits.iter().enumerate() {
            if (p >> bitpos) & 1 == 1 {
                compressed |= 1 << slot;
            }
        }
        for self_alive in [false, true] {
            let index = ((self_alive as usize) << degree) | compressed;
            if index < expected_bits && bit_at(index) {
                if self_alive {
                    s_mask[p as usize] = true;
                } else {
                    b_mask[p as usize] = true;
                }
            }
        }
    }
    canonical_prefix.push_str("MAP");
    Ok((neighbourhood, b_mask, s_mask))
}

fn encode_map(b_mask: &[bool; 256], s_mask: &[bool; 256], neighbourhood: Neighbourhood) -> String {
    let degree = neighbourhood.degree();
    let nmask = neighbourhood.mask();
    let active_bits: Vec<u8> = (0..8u8).rev().filter(|b| (nmask >> b) & 1 == 1).collect();
    let expected_bits = 1usize << (degree + 1);
    let mut bytes = vec![0u8; expected_bits.div_ceil(8)];
    for p in 0..=255u16 {
        let p = p as u8;
        if p & !nmask != 0 {
            continue;
        }
        let mut compressed = 0usize;
        for (slot, &bitpos) in active_bits.iter().enumerate() {
            if (p >> bitpos) & 1 == 1 {
                compressed |= 1 << slot;
            }
        }
        for (self_alive, side) in [(false, &b_mask), (true, &s_mask)] {
            if side[p as usize] {
                let index = ((self_alive as usize) << degree) | compressed;
                bytes[index / 8] |= 1 << (index % 8);
            }
        }
    }
    format!("MAP{}", base64::encode(&bytes))
}

/// Parse a rule string (§6.3) and compile it into its lookup table.
pub fn compile(input: &str) -> Result<CompiledRule, EngineError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EngineError::rule_parse("empty rule string"));
    }
    if trimmed.eq_ignore_ascii_case("life") {
        return compile("B3/S23");
    }

    let (body, bounded) = match trimmed.find(':') {
        Some(idx) => (&trimmed[..idx], Some(parse_bounds(&trimmed[idx + 1..])?)),
        None => (trimmed, None),
    };

    if body.len() >= 3 && body[..3].eq_ignore_ascii_case("map") {
        let mut canon = String::new();
        let (neighbourhood, b_mask, s_mask) = decode_map(&body[3..], &mut canon)?;
        let mut table = build_table(&b_mask, &s_mask);
        let canonical_base = encode_map(&b_mask, &s_mask, neighbourhood);
        let flipped = apply_b0_smax(&mut table, &canonical_base)?;
        let canonical = finalize_canonical(canonical_base, bounded.as_ref());
        tracing::debug!(target: "hashlife.rule", rule = %canonical, flipped, "rule_accepted");
        return Ok(CompiledRule { canonical, neighbourhood, bounded, table });
    }

    // `B<spec>/S<spec>` or `S<spec>/B<spec>`, case-insensitive, with an
    // optional trailing H/V neighbourhood marker.
    let mut neighbourhood = Neighbourhood::Moore;
    let mut core = body;
    if let Some(last) = core.chars().last() {
        if last.eq_ignore_ascii_case(&'h') {
            neighbourhood = Neighbourhood::Hex;
            core = &core[..core.len() - 1];
        } else if last.eq_ignore_ascii_case(&'v') {
            neighbourhood = Neighbourhood::VonNeumann;
            core = &core[..core.len() - 1];
        }
    }

    let halves: Vec<&str> = core.splitn(2, '/').collect();
    let (b_part, s_part) = if halves.len() == 2 {
        let (first, second) = (halves[0], halves[1]);
        if first.len() >= 1 && first[..1].eq_ignore_ascii_case("b") {
            (&first[1..], strip_prefix_ci(second, "s")?)
        } else if first[..1].eq_ignore_ascii_case("s") {
            (strip_prefix_ci(second, "b")?, &first[1..])
        } else {
            return Err(EngineError::rule_parse("rule must start with B or S"));
        }
    } else {
        return Err(EngineError::rule_parse("rule must contain a `/` separating B and S"));
    };

    let digit_cap = neighbourhood.degree();
    let b_entries = parse_side(b_part, digit_cap)?;
    let s_entries = parse_side(s_part, digit_cap)?;
    let b_mask = build_side_mask(&b_entries, neighbourhood)?;
    let s_mask = build_side_mask(&s_entries, neighbourhood)?;

    let mut table = build_table(&b_mask, &s_mask);
    let canonical_base = format!(
        "B{}/S{}{}",
        canonicalize_side(&b_mask, neighbourhood),
        canonicalize_side(&s_mask, neighbourhood),
        neighbourhood.suffix()
    );
    let flipped = apply_b0_smax(&mut table, &canonical_base)?;
    let canonical = finalize_canonical(canonical_base, bounded.as_ref());
    tracing::debug!(target: "hashlife.rule", rule = %canonical, flipped, "rule_accepted");

    Ok(CompiledRule { canonical, neighbourhood, bounded, table })
}

fn finalize_canonical(base: String, bounded: Option<&BoundedGrid>) -> String {
    match bounded {
        Some(b) => format!("{base}:{}", b.raw),
        None => base,
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Result<&'a str, EngineError> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Ok(&s[prefix.len()..])
    } else {
        Err(EngineError::rule_parse(format!("expected `{prefix}` (case-insensitive)")))
    }
}
