//! HTK-style text model definitions.
//!
//! ```text
//! ~h "ah"
//! <BEGINHMM>
//! <NUMSTATES> 3
//! <STATE> 2
//! <NUMMIXES> 2
//! <MIXTURE> 1 0.6
//! <MEAN> 2
//!  0.1 -0.3
//! <VARIANCE> 2
//!  1.0 0.8
//! <MIXTURE> 2 0.4
//! ...
//! <TRANSP> 3
//!  0.0 1.0 0.0
//!  0.0 0.7 0.3
//!  0.0 0.0 0.0
//! <ENDHMM>
//! ```
//!
//! Probabilities and weights are linear in the file and logarithmic in memory.
//! `<NUMSTATES>` and `<TRANSP>` count the entry and exit states.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::iter::Peekable;
use std::path::Path;
use std::str::FromStr;
use std::str::SplitWhitespace;

use crate::error::TrainingError;
use crate::model::{Mixture, ModelDictionary, State, TransitionTable, UnitModel};

const CONTEXT: &str = "model file";

pub fn read_models(path: &Path) -> Result<ModelDictionary, TrainingError> {
    let text =
        std::fs::read_to_string(path).map_err(|e| TrainingError::io("read model file", e))?;
    let models = parse_models(&text)?;
    tracing::debug!(
        path = %path.display(),
        units = models.len(),
        dim = models.dim().unwrap_or(0),
        "model file: loaded"
    );
    Ok(models)
}

/// Parses every `~h` definition; global options and other macros are skipped.
pub fn parse_models(text: &str) -> Result<ModelDictionary, TrainingError> {
    let mut tokens = Tokens::new(text);
    let mut models = ModelDictionary::new();
    while let Some(token) = tokens.next_opt() {
        if token != "~h" {
            continue;
        }
        models.insert(parse_unit(&mut tokens)?)?;
    }
    Ok(models)
}

pub fn write_models(models: &ModelDictionary, path: &Path) -> Result<(), TrainingError> {
    let file = File::create(path).map_err(|e| TrainingError::io("create model file", e))?;
    let mut writer = BufWriter::new(file);
    write_models_to(models, &mut writer)?;
    writer
        .flush()
        .map_err(|e| TrainingError::io("write model file", e))
}

pub fn write_models_to<W: Write>(
    models: &ModelDictionary,
    writer: &mut W,
) -> Result<(), TrainingError> {
    render(models, writer).map_err(|e| TrainingError::io("write model file", e))
}

fn render<W: Write>(models: &ModelDictionary, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "~o")?;
    writeln!(out, "<VECSIZE> {}", models.dim().unwrap_or(0))?;
    for (_, unit) in models.iter() {
        writeln!(out, "~h \"{}\"", unit.name())?;
        writeln!(out, "<BEGINHMM>")?;
        writeln!(out, "<NUMSTATES> {}", unit.num_states() + 2)?;
        for state in unit.states() {
            writeln!(out, "<STATE> {}", state.id)?;
            if state.num_mixtures() > 1 {
                writeln!(out, "<NUMMIXES> {}", state.num_mixtures())?;
            }
            for (m, mixture) in state.mixtures().iter().enumerate() {
                writeln!(out, "<MIXTURE> {} {:e}", m + 1, mixture.log_weight().exp())?;
                writeln!(out, "<MEAN> {}", mixture.dim())?;
                write_row(out, mixture.gaussians().iter().map(|g| g.mean))?;
                writeln!(out, "<VARIANCE> {}", mixture.dim())?;
                write_row(out, mixture.gaussians().iter().map(|g| g.variance))?;
                writeln!(out, "<GCONST> {:e}", -2.0 * mixture.log_norm())?;
            }
        }
        let table = unit.transitions();
        writeln!(out, "<TRANSP> {}", table.size())?;
        for from in 0..table.size() {
            write_row(out, table.row(from).iter().map(|p| p.exp()))?;
        }
        writeln!(out, "<ENDHMM>")?;
    }
    Ok(())
}

fn write_row<W: Write>(out: &mut W, values: impl Iterator<Item = f64>) -> std::io::Result<()> {
    for value in values {
        write!(out, " {value:e}")?;
    }
    writeln!(out)
}

fn parse_unit(tokens: &mut Tokens<'_>) -> Result<UnitModel, TrainingError> {
    let name = tokens.next("unit name")?.trim_matches('"').to_string();
    if name.is_empty() {
        return Err(TrainingError::parse(CONTEXT, "empty unit name after `~h`"));
    }
    tokens.expect_tag("<BEGINHMM>")?;

    let mut declared_states = None;
    let mut states = Vec::new();
    let transitions = loop {
        let tag = tokens.next("<STATE> or <TRANSP>")?;
        match tag.to_ascii_uppercase().as_str() {
            "<NUMSTATES>" => declared_states = Some(tokens.number::<usize>("<NUMSTATES>")?),
            "<STATE>" => states.push(parse_state(tokens)?),
            "<TRANSP>" => {
                let size = tokens.number::<usize>("<TRANSP> size")?;
                let rows = (0..size)
                    .map(|_| tokens.floats(size, "transition row"))
                    .collect::<Result<Vec<_>, _>>()?;
                break TransitionTable::from_linear_rows(&rows)?;
            }
            other => {
                return Err(TrainingError::parse(
                    CONTEXT,
                    format!("unexpected `{other}` in definition of `{name}`"),
                ))
            }
        }
    };
    tokens.expect_tag("<ENDHMM>")?;

    if let Some(declared) = declared_states {
        if declared != states.len() + 2 {
            return Err(TrainingError::invalid_model(
                name,
                format!(
                    "<NUMSTATES> {declared} does not match {} emitting states",
                    states.len()
                ),
            ));
        }
    }
    UnitModel::new(name, states, transitions)
}

fn parse_state(tokens: &mut Tokens<'_>) -> Result<State, TrainingError> {
    let id = tokens.number::<usize>("<STATE> index")?;
    let declared = if tokens.peek_is("<NUMMIXES>") {
        tokens.next("<NUMMIXES>")?;
        Some(tokens.number::<usize>("<NUMMIXES>")?)
    } else {
        None
    };

    let mut mixtures = Vec::new();
    if tokens.peek_is("<MIXTURE>") {
        while tokens.peek_is("<MIXTURE>") {
            tokens.next("<MIXTURE>")?;
            tokens.number::<usize>("<MIXTURE> index")?;
            let weight = tokens.number::<f64>("<MIXTURE> weight")?;
            mixtures.push(parse_mixture(tokens, weight)?);
        }
    } else {
        mixtures.push(parse_mixture(tokens, 1.0)?);
    }

    if let Some(declared) = declared {
        if declared != mixtures.len() {
            return Err(TrainingError::parse(
                CONTEXT,
                format!(
                    "state {id} declares {declared} mixtures but defines {}",
                    mixtures.len()
                ),
            ));
        }
    }
    Ok(State::new(id, mixtures))
}

fn parse_mixture(tokens: &mut Tokens<'_>, weight: f64) -> Result<Mixture, TrainingError> {
    tokens.expect_tag("<MEAN>")?;
    let dim = tokens.number::<usize>("<MEAN> size")?;
    let means = tokens.floats(dim, "mean vector")?;
    tokens.expect_tag("<VARIANCE>")?;
    let variance_dim = tokens.number::<usize>("<VARIANCE> size")?;
    if variance_dim != dim {
        return Err(TrainingError::parse(
            CONTEXT,
            format!("<MEAN> has {dim} values but <VARIANCE> has {variance_dim}"),
        ));
    }
    let variances = tokens.floats(dim, "variance vector")?;
    if tokens.peek_is("<GCONST>") {
        tokens.next("<GCONST>")?;
        tokens.number::<f64>("<GCONST>")?;
    }
    Ok(Mixture::from_moments(weight, &means, &variances))
}

struct Tokens<'a> {
    inner: Peekable<SplitWhitespace<'a>>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace().peekable(),
        }
    }

    fn next_opt(&mut self) -> Option<&'a str> {
        self.inner.next()
    }

    fn next(&mut self, expected: &str) -> Result<&'a str, TrainingError> {
        self.inner.next().ok_or_else(|| {
            TrainingError::parse(CONTEXT, format!("unexpected end of file, expected {expected}"))
        })
    }

    fn peek_is(&mut self, tag: &str) -> bool {
        self.inner
            .peek()
            .map_or(false, |token| token.eq_ignore_ascii_case(tag))
    }

    fn expect_tag(&mut self, tag: &str) -> Result<(), TrainingError> {
        let token = self.next(tag)?;
        if token.eq_ignore_ascii_case(tag) {
            Ok(())
        } else {
            Err(TrainingError::parse(
                CONTEXT,
                format!("expected {tag}, found `{token}`"),
            ))
        }
    }

    fn number<T: FromStr>(&mut self, what: &str) -> Result<T, TrainingError> {
        let token = self.next(what)?;
        token
            .parse()
            .map_err(|_| TrainingError::parse(CONTEXT, format!("invalid {what}: `{token}`")))
    }

    fn floats(&mut self, count: usize, what: &str) -> Result<Vec<f64>, TrainingError> {
        (0..count).map(|_| self.number::<f64>(what)).collect()
    }
}
