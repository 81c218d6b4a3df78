use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::path::Path;

use itertools::iproduct;
use thiserror::Error;

use crate::misc::{FullHashMap, HashMap};

/// Production unit. Regular coils are `0..I`, the sentinels are `-1` (start) and `I` (end).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Coil(pub i32);

impl Hash for Coil {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        hasher.write_i32(self.0)
    }
}

impl nohash_hasher::IsEnabled for Coil {}

impl Display for Coil {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProductionLine(pub u32);

impl Hash for ProductionLine {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for ProductionLine {}

impl Display for ProductionLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Mode(pub u32);

impl Hash for Mode {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for Mode {}

/// "`from` in `mode_from` is immediately followed by `to` in `mode_to` on `line`"
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub from: Coil,
    pub to: Coil,
    pub line: ProductionLine,
    pub mode_from: Mode,
    pub mode_to: Mode,
}

impl EdgeKey {
    pub fn new(from: Coil, to: Coil, line: ProductionLine, mode_from: Mode, mode_to: Mode) -> Self {
        EdgeKey { from, to, line, mode_from, mode_to }
    }
}

impl Display for EdgeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CI{}_CJ{}_L{}_MI{}_MJ{}", self.from.0, self.to.0, self.line.0, self.mode_from.0, self.mode_to.0)
    }
}

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("could not read instance: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("line {line}: coil {coil} does not exist")]
    UnknownCoil { line: usize, coil: i64 },
    #[error("line {line}: production line {production_line} does not exist")]
    UnknownLine { line: usize, production_line: i64 },
    #[error("line {line}: mode {mode} does not exist")]
    UnknownMode { line: usize, mode: i64 },
    #[error("missing `{0}` record")]
    MissingHeader(char),
    #[error("coil {0} has no due date")]
    MissingDueDate(Coil),
}

const SENTINEL_MODES: [Mode; 1] = [Mode(0)];

/// Read-only problem data shared by master, subproblems and the compact model
#[derive(Clone, Debug)]
pub struct Instance {
    comments: Vec<String>,
    number_of_coils: usize,
    number_of_lines: usize,
    number_of_modes: usize,
    maximum_delayed_coils: usize,

    due_dates: HashMap<Coil, f64>,
    modes: FullHashMap<(Coil, ProductionLine), Vec<Mode>>,
    processing_times: FullHashMap<(Coil, ProductionLine, Mode), f64>,
    setup_times: FullHashMap<EdgeKey, f64>,
    stringer_costs: FullHashMap<EdgeKey, f64>,
}

impl Instance {
    pub fn new(number_of_coils: usize, number_of_lines: usize, number_of_modes: usize, maximum_delayed_coils: usize) -> Self {
        Instance {
            comments: Vec::new(),
            number_of_coils,
            number_of_lines,
            number_of_modes,
            maximum_delayed_coils,
            due_dates: HashMap::default(),
            modes: FullHashMap::default(),
            processing_times: FullHashMap::default(),
            setup_times: FullHashMap::default(),
            stringer_costs: FullHashMap::default(),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, InstanceError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse the line based text format.
    ///
    /// Headers (`I`, `K`, `M`, `a`) may appear anywhere in the file,
    /// data records are checked against them after the whole file was tokenized.
    pub fn parse(text: &str) -> Result<Self, InstanceError> {
        let mut records: Vec<(usize, char, Vec<&str>)> = Vec::new();
        let mut comments = Vec::new();
        let mut number_of_coils = None;
        let mut number_of_lines = None;
        let mut number_of_modes = None;
        let mut maximum_delayed_coils = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = raw.trim();
            let mut chars = trimmed.chars();
            let kind = match chars.next() {
                Some(c) => c,
                None => continue,
            };
            let rest = chars.as_str();

            match kind {
                'X' => comments.push(rest.trim().to_string()),
                'I' => number_of_coils = Some(parse_field::<usize>(line_no, rest, 1)?[0]),
                'K' => number_of_lines = Some(parse_field::<usize>(line_no, rest, 1)?[0]),
                'M' => number_of_modes = Some(parse_field::<usize>(line_no, rest, 1)?[0]),
                'a' => maximum_delayed_coils = Some(parse_field::<usize>(line_no, rest, 1)?[0]),
                'm' | 'd' | 'p' | 't' | 'c' => records.push((line_no, kind, rest.split_whitespace().collect())),
                // unknown record kinds are skipped
                _ => {}
            }
        }

        let mut instance = Instance::new(
            number_of_coils.ok_or(InstanceError::MissingHeader('I'))?,
            number_of_lines.ok_or(InstanceError::MissingHeader('K'))?,
            number_of_modes.ok_or(InstanceError::MissingHeader('M'))?,
            maximum_delayed_coils.ok_or(InstanceError::MissingHeader('a'))?,
        );
        instance.comments = comments;

        for (line_no, kind, fields) in records {
            match kind {
                'm' => {
                    let [coil, line, mode, enabled] = expect_fields::<4>(line_no, &fields)?;
                    let coil = instance.regular_coil_at(line_no, coil)?;
                    let line = instance.line_at(line_no, line)?;
                    let mode = instance.mode_at(line_no, mode)?;
                    if parse_number::<i64>(line_no, enabled)? != 0 {
                        instance.enable_mode(coil, line, mode);
                    }
                }
                'd' => {
                    let [coil, due] = expect_fields::<2>(line_no, &fields)?;
                    let coil = instance.regular_coil_at(line_no, coil)?;
                    instance.set_due_date(coil, parse_number(line_no, due)?);
                }
                'p' => {
                    let [coil, line, mode, time] = expect_fields::<4>(line_no, &fields)?;
                    let coil = instance.coil_at(line_no, coil)?;
                    let line = instance.line_at(line_no, line)?;
                    let mode = instance.mode_at(line_no, mode)?;
                    instance.set_processing_time(coil, line, mode, parse_number(line_no, time)?);
                }
                't' | 'c' => {
                    let [from, to, line, mode_from, mode_to, value] = expect_fields::<6>(line_no, &fields)?;
                    let edge = EdgeKey::new(
                        instance.coil_at(line_no, from)?,
                        instance.coil_at(line_no, to)?,
                        instance.line_at(line_no, line)?,
                        instance.mode_at(line_no, mode_from)?,
                        instance.mode_at(line_no, mode_to)?,
                    );
                    let value = parse_number(line_no, value)?;
                    if kind == 't' {
                        instance.set_setup_time(edge, value);
                    } else {
                        instance.set_stringer_cost(edge, value);
                    }
                }
                _ => unreachable!(),
            }
        }

        instance.validate()?;
        Ok(instance)
    }

    /// Every regular coil needs a due date
    pub fn validate(&self) -> Result<(), InstanceError> {
        for coil in self.regular_coils() {
            if !self.due_dates.contains_key(&coil) {
                return Err(InstanceError::MissingDueDate(coil));
            }
        }
        Ok(())
    }

    fn coil_at(&self, line: usize, token: &str) -> Result<Coil, InstanceError> {
        let coil = parse_number::<i64>(line, token)?;
        if coil < -1 || coil > self.number_of_coils as i64 {
            return Err(InstanceError::UnknownCoil { line, coil });
        }
        Ok(Coil(coil as i32))
    }

    fn regular_coil_at(&self, line: usize, token: &str) -> Result<Coil, InstanceError> {
        let coil = self.coil_at(line, token)?;
        if !self.is_regular(coil) {
            return Err(InstanceError::UnknownCoil { line, coil: coil.0 as i64 });
        }
        Ok(coil)
    }

    fn line_at(&self, line: usize, token: &str) -> Result<ProductionLine, InstanceError> {
        let production_line = parse_number::<i64>(line, token)?;
        if production_line < 0 || production_line >= self.number_of_lines as i64 {
            return Err(InstanceError::UnknownLine { line, production_line });
        }
        Ok(ProductionLine(production_line as u32))
    }

    fn mode_at(&self, line: usize, token: &str) -> Result<Mode, InstanceError> {
        let mode = parse_number::<i64>(line, token)?;
        if mode < 0 || mode >= self.number_of_modes.max(1) as i64 {
            return Err(InstanceError::UnknownMode { line, mode });
        }
        Ok(Mode(mode as u32))
    }

    pub fn add_comment(&mut self, comment: &str) {
        self.comments.push(comment.to_string());
    }

    pub fn set_due_date(&mut self, coil: Coil, due_date: f64) {
        assert!(self.is_regular(coil), "due date for non regular coil {coil}");
        self.due_dates.insert(coil, due_date);
    }

    pub fn enable_mode(&mut self, coil: Coil, line: ProductionLine, mode: Mode) {
        assert!(self.is_regular(coil), "modes of sentinel coils are fixed");
        let modes = self.modes.entry((coil, line)).or_default();
        if let Err(pos) = modes.binary_search(&mode) {
            modes.insert(pos, mode);
        }
    }

    pub fn set_processing_time(&mut self, coil: Coil, line: ProductionLine, mode: Mode, time: f64) {
        self.processing_times.insert((coil, line, mode), time);
    }

    pub fn set_setup_time(&mut self, edge: EdgeKey, time: f64) {
        self.setup_times.insert(edge, time);
    }

    pub fn set_stringer_cost(&mut self, edge: EdgeKey, cost: f64) {
        self.stringer_costs.insert(edge, cost);
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn number_of_coils(&self) -> usize {
        self.number_of_coils
    }

    pub fn number_of_lines(&self) -> usize {
        self.number_of_lines
    }

    pub fn number_of_modes(&self) -> usize {
        self.number_of_modes
    }

    pub fn maximum_delayed_coils(&self) -> usize {
        self.maximum_delayed_coils
    }

    pub fn start_coil(&self) -> Coil {
        Coil(-1)
    }

    pub fn end_coil(&self) -> Coil {
        Coil(self.number_of_coils as i32)
    }

    pub fn is_start(&self, coil: Coil) -> bool {
        coil == self.start_coil()
    }

    pub fn is_end(&self, coil: Coil) -> bool {
        coil == self.end_coil()
    }

    pub fn is_regular(&self, coil: Coil) -> bool {
        coil.0 >= 0 && coil.0 < self.number_of_coils as i32
    }

    pub fn regular_coils(&self) -> impl Iterator<Item = Coil> + Clone {
        (0..self.number_of_coils as i32).map(Coil)
    }

    /// Start sentinel followed by all regular coils
    pub fn coils_without_end(&self) -> impl Iterator<Item = Coil> + Clone {
        std::iter::once(self.start_coil()).chain(self.regular_coils())
    }

    /// All regular coils followed by the end sentinel
    pub fn coils_without_start(&self) -> impl Iterator<Item = Coil> + Clone {
        self.regular_coils().chain(std::iter::once(self.end_coil()))
    }

    pub fn lines(&self) -> impl Iterator<Item = ProductionLine> + Clone {
        (0..self.number_of_lines as u32).map(ProductionLine)
    }

    /// Enabled modes of `coil` on `line`, ascending. Sentinels always run in mode 0.
    pub fn modes(&self, coil: Coil, line: ProductionLine) -> &[Mode] {
        if !self.is_regular(coil) {
            return &SENTINEL_MODES;
        }
        self.modes.get(&(coil, line)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn due_date(&self, coil: Coil) -> f64 {
        match self.due_dates.get(&coil) {
            Some(due) => *due,
            None => panic!("coil {coil} has no due date"),
        }
    }

    pub fn processing_time(&self, coil: Coil, line: ProductionLine, mode: Mode) -> f64 {
        self.processing_times.get(&(coil, line, mode)).copied().unwrap_or(0.0)
    }

    pub fn setup_time(&self, edge: &EdgeKey) -> f64 {
        self.setup_times.get(edge).copied().unwrap_or(0.0)
    }

    pub fn stringer_cost(&self, edge: &EdgeKey) -> f64 {
        self.stringer_costs.get(edge).copied().unwrap_or(0.0)
    }

    /// All decision edges of a line
    ///
    /// No self loops, nothing leaves the end coil, nothing enters the
    /// start coil and the start coil is never directly followed by the end coil.
    pub fn edges(&self, line: ProductionLine) -> Vec<EdgeKey> {
        let mut edges = Vec::new();
        for (from, to) in iproduct!(self.coils_without_end(), self.coils_without_start()) {
            if from == to || (self.is_start(from) && self.is_end(to)) {
                continue;
            }
            for (&mode_from, &mode_to) in iproduct!(self.modes(from, line), self.modes(to, line)) {
                edges.push(EdgeKey::new(from, to, line, mode_from, mode_to));
            }
        }
        edges
    }

    pub fn max_processing_time(&self, coil: Coil, line: ProductionLine) -> f64 {
        self.modes(coil, line)
            .iter()
            .map(|m| self.processing_time(coil, line, *m))
            .fold(0.0, f64::max)
    }

    pub fn max_outgoing_setup_time(&self, coil: Coil, line: ProductionLine) -> f64 {
        let mut max = 0.0_f64;
        for to in self.coils_without_start() {
            if to == coil {
                continue;
            }
            for (&mode_from, &mode_to) in iproduct!(self.modes(coil, line), self.modes(to, line)) {
                max = max.max(self.setup_time(&EdgeKey::new(coil, to, line, mode_from, mode_to)));
            }
        }
        max
    }

    pub fn max_due_date(&self) -> f64 {
        self.due_dates.values().copied().fold(0.0, f64::max)
    }

    /// Upper bound on the completion time of any coil on `line`
    pub fn big_m(&self, line: ProductionLine) -> f64 {
        self.regular_coils()
            .map(|c| self.max_processing_time(c, line) + self.max_outgoing_setup_time(c, line))
            .sum::<f64>()
            + self.max_due_date()
    }

    /// Strictly larger than the cost of any real solution
    pub fn cost_upper_bound(&self) -> f64 {
        self.stringer_costs.values().sum::<f64>() + 1.0
    }
}

fn parse_number<T: std::str::FromStr>(line: usize, token: &str) -> Result<T, InstanceError> {
    token.parse::<T>().map_err(|_| InstanceError::Malformed {
        line,
        reason: format!("`{token}` is not a valid number"),
    })
}

fn parse_field<T: std::str::FromStr>(line: usize, rest: &str, expected: usize) -> Result<Vec<T>, InstanceError> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < expected {
        return Err(InstanceError::Malformed {
            line,
            reason: format!("expected {expected} fields, found {}", fields.len()),
        });
    }
    fields[..expected].iter().map(|t| parse_number(line, t)).collect()
}

fn expect_fields<'a, const N: usize>(line: usize, fields: &[&'a str]) -> Result<[&'a str; N], InstanceError> {
    if fields.len() < N {
        return Err(InstanceError::Malformed {
            line,
            reason: format!("expected {N} fields, found {}", fields.len()),
        });
    }
    let mut out = [""; N];
    out.copy_from_slice(&fields[..N]);
    Ok(out)
}
