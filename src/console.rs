//! Line-oriented console front end for the library session.
//!
//! Each input line is one command. Rows are addressed by their 1-based
//! position in the last listing.

use anyhow::{Context, Result, anyhow, bail};
use shici_core::config::LogLevel;
use shici_core::interchange;
use shici_core::phonetic::transliterate;
use shici_core::session::PoemRow;
use shici_core::{
    CommandOutcome, ConflictPolicy, LibraryCommand, LibraryEvent, LibrarySession,
    LibrarySnapshot, MergeReport, PlaybackEvent, PoemKey, PoemPatch, PoemRecord, SearchCriteria,
    SortColumn,
};
use std::collections::{HashSet, VecDeque};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

pub const HELP: &str = "\
commands:
  list                               show the visible poems
  search [title=..] [author=..] [dynasty=..]   filter; no arguments clears
  sort title|author|dynasty          cycle ascending, descending, original order
  all | favorites                    switch view
  select <row>                       select a poem
  show [row]                         print a poem in editor layout
  fav [row]                          toggle favorite
  add title=.. author=.. [dynasty=..] [content=line|line]
  edit [row] field=value...          title author dynasty content translation
                                     note appreciation intro
  save [row]                         paste editor layout, end with a '.' line
  delete <row>...                    delete poems
  import <path> [overwrite|skip|abort|ask]
  export <path>                      .json .csv .tsv or .xlsx
  read [row] | pause | resume | stop narration
  rate <n> | volume <0..1> | voices | poll
  log <level>                        change log verbosity
  help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Policy(ConflictPolicy),
    Ask,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Help,
    Quit,
    List,
    Search(SearchCriteria),
    Sort(SortColumn),
    ShowAll,
    ShowFavorites,
    Select(usize),
    Show(Option<usize>),
    Favorite(Option<usize>),
    Add(PoemRecord),
    Edit { row: Option<usize>, patch: PoemPatch },
    Save(Option<usize>),
    Delete(Vec<usize>),
    Import { path: PathBuf, mode: ImportMode },
    Export(PathBuf),
    Read(Option<usize>),
    Pause,
    Resume,
    Stop,
    Rate(u32),
    Volume(f32),
    Voices,
    Poll,
    Log(LogLevel),
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let rest: Vec<&str> = words.collect();
    let command = match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "list" | "ls" => ConsoleCommand::List,
        "search" => {
            let fields = parse_fields(&rest)?;
            let mut criteria = SearchCriteria::default();
            for (name, value) in fields {
                match name {
                    "title" => criteria.title = value,
                    "author" => criteria.author = value,
                    "dynasty" => criteria.dynasty = value,
                    other => bail!("cannot search by '{other}'"),
                }
            }
            ConsoleCommand::Search(criteria)
        }
        "sort" => ConsoleCommand::Sort(parse_column(single(&rest, "sort")?)?),
        "all" => ConsoleCommand::ShowAll,
        "favorites" | "favs" => ConsoleCommand::ShowFavorites,
        "select" => ConsoleCommand::Select(parse_row(single(&rest, "select")?)?),
        "show" => ConsoleCommand::Show(optional_row(&rest)?),
        "fav" => ConsoleCommand::Favorite(optional_row(&rest)?),
        "add" => ConsoleCommand::Add(parse_record(&rest)?),
        "edit" => {
            let (row, fields) = match rest.split_first() {
                Some((first, tail)) if !first.contains('=') => (Some(parse_row(first)?), tail),
                _ => (None, rest.as_slice()),
            };
            ConsoleCommand::Edit {
                row,
                patch: parse_patch(fields)?,
            }
        }
        "save" => ConsoleCommand::Save(optional_row(&rest)?),
        "delete" | "rm" => {
            if rest.is_empty() {
                bail!("delete needs at least one row");
            }
            ConsoleCommand::Delete(rest.iter().map(|row| parse_row(row)).collect::<Result<_>>()?)
        }
        "import" => {
            let (path, mode) = match rest.as_slice() {
                [path] => (path, ImportMode::Ask),
                [path, mode] => (path, parse_import_mode(mode)?),
                _ => bail!("usage: import <path> [overwrite|skip|abort|ask]"),
            };
            ConsoleCommand::Import {
                path: PathBuf::from(path),
                mode,
            }
        }
        "export" => ConsoleCommand::Export(PathBuf::from(single(&rest, "export")?)),
        "read" => ConsoleCommand::Read(optional_row(&rest)?),
        "pause" => ConsoleCommand::Pause,
        "resume" => ConsoleCommand::Resume,
        "stop" => ConsoleCommand::Stop,
        "rate" => {
            let raw = single(&rest, "rate")?;
            ConsoleCommand::Rate(raw.parse().with_context(|| format!("invalid rate '{raw}'"))?)
        }
        "volume" => {
            let raw = single(&rest, "volume")?;
            let volume: f32 = raw
                .parse()
                .with_context(|| format!("invalid volume '{raw}'"))?;
            ConsoleCommand::Volume(volume)
        }
        "voices" => ConsoleCommand::Voices,
        "poll" => ConsoleCommand::Poll,
        "log" => ConsoleCommand::Log(single(&rest, "log")?.parse().map_err(|err: String| anyhow!(err))?),
        other => bail!("unknown command '{other}' (try 'help')"),
    };
    Ok(command)
}

fn single<'a>(rest: &[&'a str], verb: &str) -> Result<&'a str> {
    match rest {
        [value] => Ok(value),
        _ => bail!("{verb} takes exactly one argument"),
    }
}

fn parse_row(raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(row) if row > 0 => Ok(row),
        _ => bail!("invalid row '{raw}'"),
    }
}

fn optional_row(rest: &[&str]) -> Result<Option<usize>> {
    match rest {
        [] => Ok(None),
        [row] => parse_row(row).map(Some),
        _ => bail!("expected at most one row"),
    }
}

fn parse_column(raw: &str) -> Result<SortColumn> {
    match raw.to_ascii_lowercase().as_str() {
        "title" => Ok(SortColumn::Title),
        "author" => Ok(SortColumn::Author),
        "dynasty" => Ok(SortColumn::Dynasty),
        other => bail!("cannot sort by '{other}'"),
    }
}

fn parse_import_mode(raw: &str) -> Result<ImportMode> {
    match raw.to_ascii_lowercase().as_str() {
        "overwrite" => Ok(ImportMode::Policy(ConflictPolicy::Overwrite)),
        "skip" => Ok(ImportMode::Policy(ConflictPolicy::Skip)),
        "abort" => Ok(ImportMode::Policy(ConflictPolicy::AbortAll)),
        "ask" => Ok(ImportMode::Ask),
        other => bail!("unknown conflict mode '{other}'"),
    }
}

/// `name=value` pairs; a word without `=` continues the previous value.
fn parse_fields<'a>(words: &[&'a str]) -> Result<Vec<(&'a str, String)>> {
    let mut fields: Vec<(&str, String)> = Vec::new();
    for word in words {
        match word.split_once('=') {
            Some((name, value)) => fields.push((name, value.to_string())),
            None => match fields.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(word);
                }
                None => bail!("expected name=value, got '{word}'"),
            },
        }
    }
    Ok(fields)
}

fn parse_record(words: &[&str]) -> Result<PoemRecord> {
    let mut record = PoemRecord::default();
    for (name, value) in parse_fields(words)? {
        match name {
            "title" => record.title = value,
            "author" => record.author = value,
            "dynasty" => record.dynasty = value,
            "content" => record.content = split_content(&value),
            other => bail!("unknown field '{other}'"),
        }
    }
    if record.title.trim().is_empty() {
        bail!("add needs title=..");
    }
    Ok(record)
}

/// Fields for `edit`. New titles and content get fresh pinyin.
fn parse_patch(words: &[&str]) -> Result<PoemPatch> {
    let mut patch = PoemPatch::default();
    for (name, value) in parse_fields(words)? {
        match name {
            "title" => patch.title = Some(value),
            "author" => patch.author = Some(value),
            "dynasty" => patch.dynasty = Some(value),
            "content" => patch.content = Some(split_content(&value)),
            "translation" => patch.translation = Some(value),
            "note" => patch.note = Some(value),
            "appreciation" => patch.appreciation = Some(value),
            "intro" | "author_intro" => patch.author_intro = Some(value),
            other => bail!("unknown field '{other}'"),
        }
    }
    if patch.is_empty() {
        bail!("edit needs at least one field=value");
    }
    if let Some(title) = &patch.title {
        patch.title_pinyin = Some(transliterate(title));
    }
    if let Some(content) = &patch.content {
        patch.content_pinyin = Some(content.iter().map(|line| transliterate(line)).collect());
    }
    Ok(patch)
}

fn split_content(value: &str) -> Vec<String> {
    value.split('|').map(|line| line.trim().to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Quit,
}

pub fn lock_session(session: &Mutex<LibrarySession>) -> MutexGuard<'_, LibrarySession> {
    session
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Console<W: Write> {
    session: Arc<Mutex<LibrarySession>>,
    out: W,
    on_log_level: Box<dyn Fn(LogLevel)>,
}

impl<W: Write> Console<W> {
    pub fn new(session: Arc<Mutex<LibrarySession>>, out: W) -> Self {
        Self {
            session,
            out,
            on_log_level: Box::new(|_| {}),
        }
    }

    pub fn with_log_level_hook(mut self, hook: impl Fn(LogLevel) + 'static) -> Self {
        self.on_log_level = Box::new(hook);
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Read commands until `quit` or end of input. Command errors are
    /// printed and the loop keeps going.
    pub fn run<R: BufRead>(&mut self, mut input: R) -> Result<()> {
        self.print_event_for(LibraryCommand::GetSnapshot)?;
        loop {
            write!(self.out, "> ")?;
            self.out.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line).context("Reading console input")? == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            match self.execute_line(&line, &mut input) {
                Ok(Step::Quit) => break,
                Ok(Step::Continue) => {}
                Err(err) => {
                    debug!("Console command failed: {err:#}");
                    writeln!(self.out, "error: {err:#}")?;
                }
            }
        }
        lock_session(&self.session).apply_command(LibraryCommand::Stop)?;
        Ok(())
    }

    /// Execute one line. `input` answers conflict prompts during `import ... ask`.
    pub fn execute_line(&mut self, line: &str, input: &mut impl BufRead) -> Result<Step> {
        let command = parse_command(line)?;
        let library_command = match command {
            ConsoleCommand::Help => {
                writeln!(self.out, "{HELP}")?;
                return Ok(Step::Continue);
            }
            ConsoleCommand::Quit => return Ok(Step::Quit),
            ConsoleCommand::Log(level) => {
                (self.on_log_level)(level);
                writeln!(self.out, "log level: {level}")?;
                return Ok(Step::Continue);
            }
            ConsoleCommand::Show(row) => {
                let key = self.row_key_or_selected(row)?;
                let session = lock_session(&self.session);
                let record = session
                    .store()
                    .get(&key)
                    .ok_or_else(|| anyhow!("'{}' is no longer in the library", key.title))?;
                writeln!(self.out, "{}", shici_core::editor::render(record))?;
                writeln!(self.out, "{} · {}", record.dynasty, record.author)?;
                return Ok(Step::Continue);
            }
            ConsoleCommand::Import {
                path,
                mode: ImportMode::Ask,
            } => {
                let report = self.import_asking(&path, input)?;
                writeln!(
                    self.out,
                    "imported: {} added, {} overwritten, {} skipped",
                    report.added, report.overwritten, report.skipped
                )?;
                return self.print_event_for(LibraryCommand::GetSnapshot).map(|_| Step::Continue);
            }
            ConsoleCommand::List => LibraryCommand::GetSnapshot,
            ConsoleCommand::Search(criteria) if criteria.is_empty() => LibraryCommand::ClearSearch,
            ConsoleCommand::Search(criteria) => LibraryCommand::Search { criteria },
            ConsoleCommand::Sort(column) => LibraryCommand::SortBy { column },
            ConsoleCommand::ShowAll => LibraryCommand::ShowAll,
            ConsoleCommand::ShowFavorites => LibraryCommand::ShowFavorites,
            ConsoleCommand::Select(row) => LibraryCommand::Select {
                key: self.row_key(row)?,
            },
            ConsoleCommand::Favorite(row) => LibraryCommand::ToggleFavorite {
                key: self.row_key_or_selected(row)?,
            },
            ConsoleCommand::Add(record) => LibraryCommand::Add { record },
            ConsoleCommand::Edit { row, patch } => LibraryCommand::Update {
                key: self.row_key_or_selected(row)?,
                patch,
            },
            ConsoleCommand::Save(row) => {
                let key = self.row_key_or_selected(row)?;
                writeln!(self.out, "editing '{}'; finish with a line holding only '.'", key.title)?;
                let text = read_editor_text(input)?;
                LibraryCommand::SaveEdited { key, text }
            }
            ConsoleCommand::Delete(rows) => LibraryCommand::Delete {
                keys: rows
                    .into_iter()
                    .map(|row| self.row_key(row))
                    .collect::<Result<_>>()?,
            },
            ConsoleCommand::Import {
                path,
                mode: ImportMode::Policy(policy),
            } => LibraryCommand::Import { path, policy },
            ConsoleCommand::Export(path) => LibraryCommand::Export { path },
            ConsoleCommand::Read(row) => LibraryCommand::ReadAloud {
                key: self.row_key_or_selected(row)?,
            },
            ConsoleCommand::Pause => LibraryCommand::Pause,
            ConsoleCommand::Resume => LibraryCommand::Resume,
            ConsoleCommand::Stop => LibraryCommand::Stop,
            ConsoleCommand::Rate(rate) => LibraryCommand::SetRate { rate },
            ConsoleCommand::Volume(volume) => LibraryCommand::SetVolume { volume },
            ConsoleCommand::Voices => LibraryCommand::ListVoices,
            ConsoleCommand::Poll => LibraryCommand::PollPlayback,
        };
        self.print_event_for(library_command)?;
        Ok(Step::Continue)
    }

    fn print_event_for(&mut self, command: LibraryCommand) -> Result<()> {
        let lists_rows = matches!(
            command,
            LibraryCommand::GetSnapshot
                | LibraryCommand::Search { .. }
                | LibraryCommand::ClearSearch
                | LibraryCommand::SortBy { .. }
                | LibraryCommand::ShowAll
                | LibraryCommand::ShowFavorites
                | LibraryCommand::Add { .. }
                | LibraryCommand::Update { .. }
                | LibraryCommand::SaveEdited { .. }
                | LibraryCommand::Delete { .. }
                | LibraryCommand::Import { .. }
        );
        let event = lock_session(&self.session).apply_command(command)?;
        self.print_event(&event, lists_rows)
    }

    fn print_event(&mut self, event: &LibraryEvent, lists_rows: bool) -> Result<()> {
        for playback_event in &event.playback_events {
            match playback_event {
                PlaybackEvent::SegmentStarted { index, text } => {
                    writeln!(self.out, "  ♪ [{}] {text}", index + 1)?
                }
                PlaybackEvent::Finished => writeln!(self.out, "  ♪ finished")?,
                PlaybackEvent::Failed { message } => {
                    warn!("Narration failed: {message}");
                    writeln!(self.out, "  ♪ narration failed: {message}")?
                }
            }
        }
        match &event.outcome {
            CommandOutcome::None => {}
            CommandOutcome::Favorite(now) => {
                writeln!(self.out, "{}", if *now { "added to favorites" } else { "removed from favorites" })?
            }
            CommandOutcome::Deleted(count) => writeln!(self.out, "deleted {count} poem(s)")?,
            CommandOutcome::Merged(report) => writeln!(
                self.out,
                "imported: {} added, {} overwritten, {} skipped",
                report.added, report.overwritten, report.skipped
            )?,
            CommandOutcome::Exported(count) => writeln!(self.out, "exported {count} poem(s)")?,
            CommandOutcome::Voices(voices) => {
                for voice in voices {
                    writeln!(self.out, "  {} ({}) [{}]", voice.name, voice.language, voice.id)?;
                }
            }
        }
        if lists_rows {
            write_rows(&mut self.out, &event.snapshot)?;
        }
        write_status(&mut self.out, &event.snapshot)?;
        Ok(())
    }

    /// Ask about every conflict up front, then merge with the answers. The
    /// session stays unlocked while waiting on the user.
    fn import_asking(&mut self, path: &Path, input: &mut impl BufRead) -> Result<MergeReport> {
        let incoming = interchange::import(path)?;
        let mut seen: HashSet<PoemKey> = lock_session(&self.session)
            .store()
            .records()
            .iter()
            .map(PoemRecord::key)
            .collect();
        let mut answers = VecDeque::new();
        for record in &incoming {
            let key = record.key();
            if seen.insert(key.clone()) {
                continue;
            }
            let answer = ask_conflict(&mut self.out, input, &key);
            answers.push_back(answer);
            if answer == ConflictPolicy::AbortAll {
                break;
            }
        }
        let resolver = move |_existing: &PoemRecord, _incoming: &PoemRecord| {
            answers.pop_front().unwrap_or(ConflictPolicy::Skip)
        };
        Ok(lock_session(&self.session).merge_records(incoming, resolver)?)
    }

    fn row_key(&self, row: usize) -> Result<PoemKey> {
        let snapshot = lock_session(&self.session).snapshot();
        row_key_in(&snapshot, row)
    }

    fn row_key_or_selected(&self, row: Option<usize>) -> Result<PoemKey> {
        match row {
            Some(row) => self.row_key(row),
            None => lock_session(&self.session)
                .snapshot()
                .selected
                .ok_or_else(|| anyhow!("no poem selected; pass a row number")),
        }
    }
}

fn row_key_in(snapshot: &LibrarySnapshot, row: usize) -> Result<PoemKey> {
    snapshot
        .rows
        .get(row.wrapping_sub(1))
        .map(|row: &PoemRow| PoemKey::new(row.title.clone(), row.author.clone()))
        .ok_or_else(|| anyhow!("no row {row} ({} visible)", snapshot.rows.len()))
}

fn ask_conflict<W: Write, R: BufRead>(out: &mut W, input: &mut R, key: &PoemKey) -> ConflictPolicy {
    let _ = write!(
        out,
        "'{}' by '{}' already exists. [o]verwrite, [s]kip, [a]bort? ",
        key.title, key.author
    );
    let _ = out.flush();
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) | Err(_) => ConflictPolicy::AbortAll,
        Ok(_) => match answer.trim().to_ascii_lowercase().as_str() {
            "o" | "overwrite" => ConflictPolicy::Overwrite,
            "a" | "abort" => ConflictPolicy::AbortAll,
            _ => ConflictPolicy::Skip,
        },
    }
}

/// Lines up to a lone `.` or end of input.
fn read_editor_text<R: BufRead>(input: &mut R) -> Result<String> {
    let mut text = String::new();
    loop {
        let mut line = String::new();
        if input.read_line(&mut line).context("Reading editor text")? == 0 {
            break;
        }
        if line.trim() == "." {
            break;
        }
        text.push_str(&line);
    }
    Ok(text)
}

fn write_rows<W: Write>(out: &mut W, snapshot: &LibrarySnapshot) -> Result<()> {
    if snapshot.rows.is_empty() {
        writeln!(out, "  (no poems)")?;
    }
    for (idx, row) in snapshot.rows.iter().enumerate() {
        let marker = if snapshot.selected.as_ref().is_some_and(|key| {
            key.title == row.title && key.author == row.author
        }) {
            '>'
        } else {
            ' '
        };
        let star = if row.favorite { '★' } else { ' ' };
        writeln!(
            out,
            "{marker}{:>3}. {star} {}  {}·{}",
            idx + 1,
            row.title,
            row.dynasty,
            row.author
        )?;
    }
    Ok(())
}

fn write_status<W: Write>(out: &mut W, snapshot: &LibrarySnapshot) -> Result<()> {
    let sort = match snapshot.sort_column {
        Some(column) => format!("{column:?} {:?}", snapshot.sort_direction).to_lowercase(),
        None => "none".to_string(),
    };
    writeln!(
        out,
        "[{:?} view | sort: {sort} | {} of {} poems | narration: {} rate {} volume {:.2}]",
        snapshot.view,
        snapshot.rows.len(),
        snapshot.total_poems,
        snapshot.playback.state,
        snapshot.playback.rate,
        snapshot.playback.volume
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shici_core::{FavoritesLedger, PlaybackController, PoemStore, SpeechEngine};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn console_in(dir: &TempDir) -> Console<Vec<u8>> {
        let poems = vec![
            PoemRecord::new("静夜思", "李白", "唐", vec!["床前明月光，".into()]),
            PoemRecord::new("春晓", "孟浩然", "唐", vec!["春眠不觉晓，".into()]),
        ];
        let store = PoemStore::create(dir.path().join("poems.json"), poems).unwrap();
        let favorites = FavoritesLedger::load(dir.path().join("favorites.json")).unwrap();
        let playback = PlaybackController::new(|| -> anyhow::Result<Arc<dyn SpeechEngine>> {
            Err(anyhow!("no synthesizer in tests"))
        });
        let session = LibrarySession::new(store, favorites, playback);
        Console::new(Arc::new(Mutex::new(session)), Vec::new())
    }

    fn output(console: Console<Vec<u8>>) -> String {
        String::from_utf8(console.into_output()).unwrap()
    }

    #[test]
    fn parses_search_fields_with_spaces() {
        let command = parse_command("search title=Ode to author=Keats").unwrap();
        assert_eq!(
            command,
            ConsoleCommand::Search(SearchCriteria::new("Ode to", "Keats", ""))
        );
        assert_eq!(
            parse_command("search").unwrap(),
            ConsoleCommand::Search(SearchCriteria::default())
        );
        assert!(parse_command("search genre=ci").is_err());
    }

    #[test]
    fn parses_rows_and_modes() {
        assert_eq!(parse_command("select 2").unwrap(), ConsoleCommand::Select(2));
        assert!(parse_command("select 0").is_err());
        assert_eq!(parse_command("read").unwrap(), ConsoleCommand::Read(None));
        assert_eq!(
            parse_command("import a.csv skip").unwrap(),
            ConsoleCommand::Import {
                path: PathBuf::from("a.csv"),
                mode: ImportMode::Policy(ConflictPolicy::Skip),
            }
        );
        assert_eq!(
            parse_command("log debug").unwrap(),
            ConsoleCommand::Log(LogLevel::Debug)
        );
        assert!(parse_command("launch").is_err());
    }

    #[test]
    fn add_requires_title_and_splits_content() {
        let ConsoleCommand::Add(record) =
            parse_command("add title=登鹳雀楼 author=王之涣 content=白日依山尽，|黄河入海流。").unwrap()
        else {
            panic!("expected add");
        };
        assert_eq!(record.content, vec!["白日依山尽，", "黄河入海流。"]);
        assert!(parse_command("add author=佚名").is_err());
    }

    #[test]
    fn parses_edit_with_and_without_row() {
        let ConsoleCommand::Edit { row, patch } =
            parse_command("edit 2 note=春日 即景 content=春眠不觉晓|处处闻啼鸟").unwrap()
        else {
            panic!("expected edit");
        };
        assert_eq!(row, Some(2));
        assert_eq!(patch.note.as_deref(), Some("春日 即景"));
        assert_eq!(patch.content.as_ref().map(Vec::len), Some(2));
        assert_eq!(patch.content_pinyin.as_ref().map(Vec::len), Some(2));
        assert!(patch.title.is_none());

        let ConsoleCommand::Edit { row, patch } = parse_command("edit title=春晓").unwrap() else {
            panic!("expected edit");
        };
        assert_eq!(row, None);
        assert_eq!(patch.title_pinyin.as_deref(), Some("chūn xiǎo"));

        assert!(parse_command("edit 1").is_err());
        assert!(parse_command("edit 1 mood=calm").is_err());
        assert_eq!(parse_command("save").unwrap(), ConsoleCommand::Save(None));
    }

    #[test]
    fn edit_updates_the_row() {
        let dir = TempDir::new().unwrap();
        let mut console = console_in(&dir);
        let mut input = Cursor::new(Vec::new());

        console.execute_line("edit 1 dynasty=盛唐 note=名篇", &mut input).unwrap();
        {
            let session = lock_session(&console.session);
            let record = session.store().get(&PoemKey::new("静夜思", "李白")).unwrap();
            assert_eq!(record.dynasty, "盛唐");
            assert_eq!(record.note, "名篇");
        }
        assert!(output(console).contains("  1.   静夜思  盛唐·李白"));
    }

    #[test]
    fn save_reads_editor_layout_until_dot() {
        let dir = TempDir::new().unwrap();
        let mut console = console_in(&dir);
        console
            .execute_line("select 2", &mut Cursor::new(Vec::new()))
            .unwrap();
        let mut input = Cursor::new(
            "chūn xiǎo\n春晓·其一\n\nchūn mián bù jué xiǎo\n春眠不觉晓\n.\nlist\n"
                .as_bytes()
                .to_vec(),
        );

        console.execute_line("save", &mut input).unwrap();
        let mut rest = String::new();
        input.read_line(&mut rest).unwrap();
        assert_eq!(rest, "list\n");

        let session = lock_session(&console.session);
        let renamed = PoemKey::new("春晓·其一", "孟浩然");
        let record = session.store().get(&renamed).unwrap();
        assert_eq!(record.content, vec!["春眠不觉晓"]);
        assert_eq!(session.snapshot().selected, Some(renamed));
    }

    #[test]
    fn favorite_and_favorites_view() {
        let dir = TempDir::new().unwrap();
        let mut console = console_in(&dir);
        let mut input = Cursor::new(Vec::new());

        console.execute_line("fav 2", &mut input).unwrap();
        console.execute_line("favorites", &mut input).unwrap();
        let text = output(console);
        assert!(text.contains("added to favorites"));
        assert!(text.contains("  1. ★ 春晓  唐·孟浩然"));
        assert!(text.contains("[Favorites view"));
    }

    #[test]
    fn read_without_engine_reports_error_and_stays_idle() {
        let dir = TempDir::new().unwrap();
        let mut console = console_in(&dir);
        let mut input = Cursor::new(Vec::new());

        let err = console.execute_line("read 1", &mut input).unwrap_err();
        assert!(err.to_string().contains("speech engine unavailable"));
        console.execute_line("list", &mut input).unwrap();
        assert!(output(console).contains("narration: idle"));
    }

    #[test]
    fn ask_import_prompts_per_conflict() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("incoming.json");
        std::fs::write(
            &source,
            r#"{"poems": [
                {"title": "静夜思", "author": "李白", "dynasty": "盛唐"},
                {"title": "春晓", "author": "孟浩然", "dynasty": "盛唐"}
            ]}"#,
        )
        .unwrap();
        let mut console = console_in(&dir);
        let mut answers = Cursor::new(b"o\ns\n".to_vec());

        console
            .execute_line(&format!("import {}", source.display()), &mut answers)
            .unwrap();
        {
            let session = lock_session(&console.session);
            assert_eq!(
                session.store().get(&PoemKey::new("静夜思", "李白")).unwrap().dynasty,
                "盛唐"
            );
            assert_eq!(
                session.store().get(&PoemKey::new("春晓", "孟浩然")).unwrap().dynasty,
                "唐"
            );
        }
        assert!(output(console).contains("0 added, 1 overwritten, 1 skipped"));
    }

    #[test]
    fn ask_import_abort_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("incoming.json");
        std::fs::write(
            &source,
            r#"{"poems": [
                {"title": "登鹳雀楼", "author": "王之涣"},
                {"title": "静夜思", "author": "李白", "dynasty": "盛唐"},
                {"title": "春晓", "author": "孟浩然", "dynasty": "盛唐"}
            ]}"#,
        )
        .unwrap();
        let mut console = console_in(&dir);
        let mut answers = Cursor::new(b"a\n".to_vec());

        let err = console
            .execute_line(&format!("import {}", source.display()), &mut answers)
            .unwrap_err();
        assert!(err.to_string().contains("merge aborted"));
        let session = lock_session(&console.session);
        assert_eq!(session.store().len(), 2);
        assert!(!session.store().contains(&PoemKey::new("登鹳雀楼", "王之涣")));
    }

    #[test]
    fn run_stops_at_quit_and_reports_errors() {
        let dir = TempDir::new().unwrap();
        let mut console = console_in(&dir);
        console
            .run(Cursor::new(b"bogus\nsort title\nquit\nlist\n".to_vec()))
            .unwrap();
        let text = output(console);
        assert!(text.contains("error: unknown command 'bogus'"));
        assert!(text.contains("sort: title ascending"));
        assert_eq!(text.matches("[All view").count(), 2);
    }
}
