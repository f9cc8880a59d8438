//! In-memory desktop used by the engine tests.
//!
//! `FakeTree` models an accessibility tree spread over several processes.
//! `FakeKeys` acts on it the way a real app reacts to ⌘C / ⌘A / ⌘V, so the
//! clipboard paths can be driven end to end.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::platform::{
    attr, AccessibilityApi, ClipboardAccess, Desktop, KeyChord, KeySynthesizer, Pid,
    ProcessInspector, TextRange, TrustProvider,
};

/// Index of a node in the fake tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// How a node reacts to attribute writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Writes are applied.
    #[default]
    Apply,
    /// Writes fail with an error.
    Reject,
    /// Writes report success but change nothing.
    Ignore,
}

#[derive(Debug, Default)]
struct Node {
    role: String,
    subrole: Option<String>,
    pid: Option<Pid>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    strings: HashMap<String, String>,
    bools: HashMap<String, bool>,
    elements: HashMap<String, NodeId>,
    selected_range: Option<TextRange>,
    settable: HashSet<String>,
    alive: bool,
    write_mode: WriteMode,
    copy_text: Option<String>,
}

/// One recorded attribute write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub node: NodeId,
    pub attribute: String,
    pub value: String,
}

#[derive(Debug, Default)]
struct TreeState {
    nodes: Vec<Node>,
    apps: HashMap<Pid, NodeId>,
    system_focus: Option<NodeId>,
    focused_app: Option<NodeId>,
    system_focus_hidden: bool,
    focus_after_bootstrap: HashMap<Pid, NodeId>,
    writes: Vec<Write>,
}

/// A shared, mutable accessibility tree.
#[derive(Debug, Clone, Default)]
pub struct FakeTree {
    state: Arc<Mutex<TreeState>>,
}

impl FakeTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TreeState> {
        self.state.lock().unwrap()
    }

    /// Create the application root of a process.
    pub fn app(&self, pid: Pid) -> NodeId {
        let mut state = self.lock();
        let id = NodeId(state.nodes.len());
        state.nodes.push(Node {
            role: "AXApplication".into(),
            pid: Some(pid),
            alive: true,
            ..Node::default()
        });
        state.apps.insert(pid, id);
        id
    }

    /// Add a child under `parent`, owned by the parent's process.
    pub fn add(&self, parent: NodeId, role: &str) -> NodeId {
        let mut state = self.lock();
        let id = NodeId(state.nodes.len());
        let pid = state.nodes[parent.0].pid;
        state.nodes.push(Node {
            role: role.into(),
            pid,
            parent: Some(parent),
            alive: true,
            ..Node::default()
        });
        state.nodes[parent.0].children.push(id);
        id
    }

    pub fn set_subrole(&self, node: NodeId, subrole: &str) {
        self.lock().nodes[node.0].subrole = Some(subrole.into());
    }

    pub fn set_value(&self, node: NodeId, value: &str) {
        self.lock().nodes[node.0]
            .strings
            .insert(attr::VALUE.into(), value.into());
    }

    /// Give a node a selection over its current value.
    pub fn select(&self, node: NodeId, range: TextRange) {
        let mut state = self.lock();
        let n = &mut state.nodes[node.0];
        let value = n.strings.get(attr::VALUE).cloned().unwrap_or_default();
        n.strings
            .insert(attr::SELECTED_TEXT.into(), range.slice(&value).to_string());
        n.selected_range = Some(range);
    }

    /// Expose a selected-text attribute without a range.
    pub fn set_selected_text(&self, node: NodeId, text: &str) {
        self.lock().nodes[node.0]
            .strings
            .insert(attr::SELECTED_TEXT.into(), text.into());
    }

    /// Expose a range without a selected-text attribute.
    pub fn set_range(&self, node: NodeId, range: TextRange) {
        self.lock().nodes[node.0].selected_range = Some(range);
    }

    /// Text the app puts on the clipboard when asked to copy, without
    /// exposing it through any attribute.
    pub fn set_copy_text(&self, node: NodeId, text: &str) {
        self.lock().nodes[node.0].copy_text = Some(text.into());
    }

    pub fn set_bool(&self, node: NodeId, attribute: &str, value: bool) {
        self.lock().nodes[node.0]
            .bools
            .insert(attribute.into(), value);
    }

    pub fn settable(&self, node: NodeId, attribute: &str) {
        self.lock().nodes[node.0].settable.insert(attribute.into());
    }

    pub fn write_mode(&self, node: NodeId, mode: WriteMode) {
        self.lock().nodes[node.0].write_mode = mode;
    }

    /// Make `node` the focused element of its process and of the system.
    pub fn focus(&self, node: NodeId) {
        let mut state = self.lock();
        Self::focus_locked(&mut state, node);
    }

    fn focus_locked(state: &mut TreeState, node: NodeId) {
        state.system_focus = Some(node);
        if let Some(pid) = state.nodes[node.0].pid {
            if let Some(&app) = state.apps.get(&pid) {
                state.nodes[app.0]
                    .elements
                    .insert(attr::FOCUSED_UI_ELEMENT.into(), node);
                state.focused_app = Some(app);
            }
        }
    }

    /// Make the system-wide focused element query fail.
    pub fn hide_system_focus(&self) {
        self.lock().system_focus_hidden = true;
    }

    /// Set an element-valued attribute.
    pub fn link(&self, node: NodeId, attribute: &str, target: NodeId) {
        self.lock().nodes[node.0]
            .elements
            .insert(attribute.into(), target);
    }

    /// Focus `node` once accessibility is enabled on its process.
    pub fn focus_after_bootstrap(&self, pid: Pid, node: NodeId) {
        self.lock().focus_after_bootstrap.insert(pid, node);
    }

    /// Destroy a node; its handle stops resolving.
    pub fn kill(&self, node: NodeId) {
        self.lock().nodes[node.0].alive = false;
    }

    pub fn value(&self, node: NodeId) -> Option<String> {
        self.lock().nodes[node.0].strings.get(attr::VALUE).cloned()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.lock().writes.clone()
    }

    /// Attribute writes other than accessibility enablement.
    pub fn text_writes(&self) -> Vec<Write> {
        self.writes()
            .into_iter()
            .filter(|w| w.attribute == attr::VALUE || w.attribute == attr::SELECTED_TEXT)
            .collect()
    }

    fn focused(state: &TreeState) -> Option<NodeId> {
        state.system_focus.filter(|n| state.nodes[n.0].alive)
    }

    /// Selection of the focused element, as a real app would copy it.
    fn copy_selection(&self) -> Option<String> {
        let state = self.lock();
        let node = &state.nodes[Self::focused(&state)?.0];
        node.copy_text.clone().or_else(|| {
            node.strings
                .get(attr::SELECTED_TEXT)
                .filter(|s| !s.is_empty())
                .cloned()
        })
    }

    /// Insert pasted text into the focused element.
    fn paste(&self, text: &str, replace_all: bool) {
        let mut state = self.lock();
        let Some(id) = Self::focused(&state) else {
            return;
        };
        let node = &mut state.nodes[id.0];
        let current = node.strings.get(attr::VALUE).cloned().unwrap_or_default();
        let updated = match (replace_all, node.selected_range) {
            (true, _) => text.to_string(),
            (false, Some(range)) => range.splice(&current, text),
            (false, None) => format!("{current}{text}"),
        };
        node.strings.insert(attr::VALUE.into(), updated);
        node.strings.remove(attr::SELECTED_TEXT);
        node.selected_range = None;
    }
}

impl AccessibilityApi for FakeTree {
    type Element = NodeId;

    fn system_focused_element(&self) -> Option<NodeId> {
        let state = self.lock();
        if state.system_focus_hidden {
            return None;
        }
        Self::focused(&state)
    }

    fn focused_application(&self) -> Option<NodeId> {
        self.lock().focused_app
    }

    fn application(&self, pid: Pid) -> Option<NodeId> {
        self.lock().apps.get(&pid).copied()
    }

    fn element_attribute(&self, element: &NodeId, attribute: &str) -> Option<NodeId> {
        let state = self.lock();
        let node = state.nodes.get(element.0).filter(|n| n.alive)?;
        let target = if attribute == attr::PARENT {
            node.parent
        } else {
            node.elements.get(attribute).copied()
        }?;
        state.nodes[target.0].alive.then_some(target)
    }

    fn string_attribute(&self, element: &NodeId, attribute: &str) -> Option<String> {
        let state = self.lock();
        let node = state.nodes.get(element.0).filter(|n| n.alive)?;
        match attribute {
            attr::ROLE => Some(node.role.clone()),
            attr::SUBROLE => node.subrole.clone(),
            _ => node.strings.get(attribute).cloned(),
        }
    }

    fn bool_attribute(&self, element: &NodeId, attribute: &str) -> Option<bool> {
        let state = self.lock();
        let node = state.nodes.get(element.0).filter(|n| n.alive)?;
        node.bools.get(attribute).copied()
    }

    fn selected_range(&self, element: &NodeId) -> Option<TextRange> {
        let state = self.lock();
        state.nodes.get(element.0).filter(|n| n.alive)?.selected_range
    }

    fn children(&self, element: &NodeId) -> Vec<NodeId> {
        let state = self.lock();
        state
            .nodes
            .get(element.0)
            .filter(|n| n.alive)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn pid(&self, element: &NodeId) -> Option<Pid> {
        let state = self.lock();
        state.nodes.get(element.0).filter(|n| n.alive)?.pid
    }

    fn is_settable(&self, element: &NodeId, attribute: &str) -> bool {
        let state = self.lock();
        state
            .nodes
            .get(element.0)
            .is_some_and(|n| n.alive && n.settable.contains(attribute))
    }

    fn set_string_attribute(&self, element: &NodeId, attribute: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        let node = &mut state.nodes[element.0];
        if !node.alive || node.write_mode == WriteMode::Reject {
            return Err(Error::attribute_write(attribute, "rejected"));
        }
        if node.write_mode == WriteMode::Apply {
            if attribute == attr::SELECTED_TEXT {
                let current = node.strings.get(attr::VALUE).cloned().unwrap_or_default();
                if let Some(range) = node.selected_range {
                    node.strings
                        .insert(attr::VALUE.into(), range.splice(&current, value));
                }
            }
            node.strings.insert(attribute.into(), value.into());
        }
        state.writes.push(Write {
            node: *element,
            attribute: attribute.into(),
            value: value.into(),
        });
        Ok(())
    }

    fn set_bool_attribute(&self, element: &NodeId, attribute: &str, value: bool) -> Result<()> {
        let mut state = self.lock();
        let node = &mut state.nodes[element.0];
        if !node.alive || node.write_mode == WriteMode::Reject {
            return Err(Error::attribute_write(attribute, "rejected"));
        }
        node.bools.insert(attribute.into(), value);
        let pid = node.pid;
        state.writes.push(Write {
            node: *element,
            attribute: attribute.into(),
            value: value.to_string(),
        });
        if let Some(target) = pid.and_then(|p| state.focus_after_bootstrap.remove(&p)) {
            state.system_focus_hidden = false;
            Self::focus_locked(&mut state, target);
        }
        Ok(())
    }
}

/// A clipboard operation issued through [`ClipboardAccess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipOp {
    Get,
    Set(String),
    Clear,
}

#[derive(Debug, Default)]
struct ClipState {
    text: Option<String>,
    ops: Vec<ClipOp>,
}

/// A shared clipboard that records every call.
#[derive(Debug, Clone, Default)]
pub struct FakeClipboard {
    state: Arc<Mutex<ClipState>>,
}

impl FakeClipboard {
    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::default();
        clipboard.state.lock().unwrap().text = Some(text.into());
        clipboard
    }

    /// Current contents, without recording an operation.
    pub fn contents(&self) -> Option<String> {
        self.state.lock().unwrap().text.clone()
    }

    pub fn ops(&self) -> Vec<ClipOp> {
        self.state.lock().unwrap().ops.clone()
    }

    fn put(&self, text: Option<String>) {
        self.state.lock().unwrap().text = text;
    }
}

impl ClipboardAccess for FakeClipboard {
    fn get_text(&self) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(ClipOp::Get);
        Ok(state.text.clone())
    }

    fn set_text(&self, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(ClipOp::Set(text.into()));
        state.text = Some(text.into());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(ClipOp::Clear);
        state.text = None;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct KeyState {
    sent: Vec<KeyChord>,
    select_all_pending: bool,
}

/// Key synthesis that drives the fake tree and clipboard.
#[derive(Debug, Clone)]
pub struct FakeKeys {
    tree: FakeTree,
    clipboard: FakeClipboard,
    state: Arc<Mutex<KeyState>>,
}

impl FakeKeys {
    pub fn new(tree: FakeTree, clipboard: FakeClipboard) -> Self {
        Self {
            tree,
            clipboard,
            state: Arc::default(),
        }
    }

    pub fn sent(&self) -> Vec<KeyChord> {
        self.state.lock().unwrap().sent.clone()
    }
}

impl KeySynthesizer for FakeKeys {
    fn send(&self, chord: KeyChord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(chord);
        match chord {
            KeyChord::Copy => {
                if let Some(text) = self.tree.copy_selection() {
                    self.clipboard.put(Some(text));
                }
            }
            KeyChord::SelectAll => state.select_all_pending = true,
            KeyChord::Paste => {
                let replace_all = std::mem::take(&mut state.select_all_pending);
                if let Some(text) = self.clipboard.contents() {
                    self.tree.paste(&text, replace_all);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ProcState {
    bundle_ids: HashMap<Pid, String>,
    executables: HashMap<Pid, PathBuf>,
    frameworks: HashMap<Pid, Vec<String>>,
    frontmost: Option<Pid>,
    activations: Vec<Pid>,
    lookups: usize,
}

/// Scripted process metadata.
#[derive(Debug, Clone, Default)]
pub struct FakeProcesses {
    state: Arc<Mutex<ProcState>>,
}

impl FakeProcesses {
    pub fn bundle(&self, pid: Pid, id: &str) -> &Self {
        self.state.lock().unwrap().bundle_ids.insert(pid, id.into());
        self
    }

    pub fn executable(&self, pid: Pid, path: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .executables
            .insert(pid, PathBuf::from(path));
        self
    }

    pub fn frameworks(&self, pid: Pid, entries: &[&str]) -> &Self {
        self.state
            .lock()
            .unwrap()
            .frameworks
            .insert(pid, entries.iter().map(|e| (*e).to_string()).collect());
        self
    }

    pub fn set_frontmost(&self, pid: Option<Pid>) {
        self.state.lock().unwrap().frontmost = pid;
    }

    pub fn activations(&self) -> Vec<Pid> {
        self.state.lock().unwrap().activations.clone()
    }

    /// Number of bundle identifier lookups served.
    pub fn lookups(&self) -> usize {
        self.state.lock().unwrap().lookups
    }
}

impl ProcessInspector for FakeProcesses {
    fn bundle_identifier(&self, pid: Pid) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        state.lookups += 1;
        state.bundle_ids.get(&pid).cloned()
    }

    fn bundle_path(&self, pid: Pid) -> Option<PathBuf> {
        let state = self.state.lock().unwrap();
        state
            .executables
            .get(&pid)
            .and_then(|p| p.ancestors().find(|a| a.extension().is_some_and(|e| e == "app")))
            .map(PathBuf::from)
    }

    fn executable_path(&self, pid: Pid) -> Option<PathBuf> {
        self.state.lock().unwrap().executables.get(&pid).cloned()
    }

    fn framework_entries(&self, pid: Pid) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .frameworks
            .get(&pid)
            .cloned()
            .unwrap_or_default()
    }

    fn frontmost_pid(&self) -> Option<Pid> {
        self.state.lock().unwrap().frontmost
    }

    fn activate(&self, pid: Pid) -> bool {
        self.state.lock().unwrap().activations.push(pid);
        true
    }
}

/// Trust state that tests flip by hand.
#[derive(Debug, Clone, Default)]
pub struct FakeTrust {
    trusted: Arc<AtomicBool>,
    prompts: Arc<AtomicUsize>,
}

impl FakeTrust {
    pub fn trusted() -> Self {
        let trust = Self::default();
        trust.grant();
        trust
    }

    pub fn grant(&self) {
        self.trusted.store(true, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl TrustProvider for FakeTrust {
    fn is_trusted(&self) -> bool {
        self.trusted.load(Ordering::SeqCst)
    }

    fn prompt(&self) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.is_trusted()
    }
}

/// Handles to the fakes behind a [`Desktop`].
#[derive(Debug, Clone)]
pub struct Fakes {
    pub tree: FakeTree,
    pub clipboard: FakeClipboard,
    pub keys: FakeKeys,
    pub processes: FakeProcesses,
}

/// A desktop whose clipboard starts out holding `clipboard`.
pub fn fake_desktop(clipboard: Option<&str>) -> (Desktop<FakeTree>, Fakes) {
    let tree = FakeTree::new();
    let clipboard = clipboard.map_or_else(FakeClipboard::default, FakeClipboard::with_text);
    let keys = FakeKeys::new(tree.clone(), clipboard.clone());
    let processes = FakeProcesses::default();
    let desktop = Desktop::new(
        tree.clone(),
        Box::new(clipboard.clone()),
        Box::new(keys.clone()),
        Box::new(processes.clone()),
    );
    (
        desktop,
        Fakes {
            tree,
            clipboard,
            keys,
            processes,
        },
    )
}
