//! Scoped name → storage mapping.
//!
//! - [`SymbolTable`]: a stack of [`Scope`]s; scope 0 is the global scope and
//!   is never popped
//! - [`IdentMemory`]: the storage descriptor bound to a declared name
//! - [`ArrayLayout`]: per-dimension extents of an array descriptor
//!
//! Function calls push a frame marker so that lookups from inside the callee
//! skip the caller's local scopes and go straight to the globals.

use crate::ast::BType;
use crate::error::SysyError;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Backing cells shared between an array and any parameter bound to it.
pub type Cells = Rc<RefCell<Vec<Value>>>;

/// A window into some cells: `len` elements starting at `offset`.
#[derive(Debug, Clone)]
pub struct Storage {
    cells: Cells,
    offset: usize,
    len: usize,
}

impl Storage {
    pub fn zeroed(len: usize) -> Self {
        Self::from_values(vec![Value::default(); len])
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        let len = values.len();
        Self {
            cells: Rc::new(RefCell::new(values)),
            offset: 0,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        if index >= self.len {
            return None;
        }
        self.cells.borrow().get(self.offset + index).copied()
    }

    pub fn set(&self, index: usize, value: Value) -> bool {
        if index >= self.len {
            return false;
        }
        match self.cells.borrow_mut().get_mut(self.offset + index) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// A sub-window sharing the same cells, or `None` if it would reach past
    /// the end of this one.
    pub fn slice(&self, start: usize, len: usize) -> Option<Storage> {
        if start.checked_add(len)? > self.len {
            return None;
        }
        Some(Storage {
            cells: Rc::clone(&self.cells),
            offset: self.offset + start,
            len,
        })
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.cells.borrow()[self.offset..self.offset + self.len].to_vec()
    }

    pub fn shares_cells_with(&self, other: &Storage) -> bool {
        Rc::ptr_eq(&self.cells, &other.cells)
    }
}

/// Per-dimension extents. `unsized_first` marks an array parameter whose
/// first extent is unknown (`int a[][3]`); its `extents[0]` is then 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayLayout {
    pub extents: Vec<u32>,
    pub unsized_first: bool,
}

impl ArrayLayout {
    pub fn new(extents: Vec<u32>) -> Self {
        Self {
            extents,
            unsized_first: false,
        }
    }

    pub fn parameter(inner: Vec<u32>) -> Self {
        let mut extents = Vec::with_capacity(inner.len() + 1);
        extents.push(0);
        extents.extend(inner);
        Self {
            extents,
            unsized_first: true,
        }
    }

    pub fn dimension(&self) -> usize {
        self.extents.len()
    }

    /// Number of elements covered by one step of dimension `dim`.
    pub fn stride(&self, dim: usize) -> usize {
        self.extents[dim + 1..]
            .iter()
            .map(|&extent| extent as usize)
            .product()
    }

    /// Product of the extents, or `None` when it exceeds 2^32 − 1.
    pub fn element_count(extents: &[u32]) -> Option<u32> {
        extents
            .iter()
            .try_fold(1u32, |count, &extent| count.checked_mul(extent))
    }
}

#[derive(Debug, Clone)]
pub struct IdentMemory {
    pub value_type: BType,
    pub is_const: bool,
    pub storage: Storage,
    pub layout: Option<ArrayLayout>,
    /// Folded initializer of a constant, filled once declaration processing
    /// has produced it.
    pub const_init: Option<Vec<Value>>,
}

impl IdentMemory {
    pub fn scalar(value_type: BType, is_const: bool) -> Self {
        Self {
            value_type,
            is_const,
            storage: Storage::zeroed(1),
            layout: None,
            const_init: None,
        }
    }

    pub fn array(value_type: BType, is_const: bool, layout: ArrayLayout, storage: Storage) -> Self {
        Self {
            value_type,
            is_const,
            storage,
            layout: Some(layout),
            const_init: None,
        }
    }

    pub fn element_count(&self) -> usize {
        self.storage.len()
    }

    pub fn is_array(&self) -> bool {
        self.layout.is_some()
    }

    pub fn dimension(&self) -> usize {
        self.layout.as_ref().map_or(0, ArrayLayout::dimension)
    }

    pub fn extents(&self) -> &[u32] {
        self.layout.as_ref().map_or(&[], |layout| &layout.extents)
    }

    /// Value of element `index` of a constant, for constant folding.
    pub fn const_value(&self, name: &str, index: usize, line: u32) -> Result<Value, SysyError> {
        let init = self.const_init.as_ref().ok_or_else(|| {
            SysyError::internal_error(
                line,
                format!("constant '{}' was read before its initializer was produced", name),
            )
        })?;
        init.get(index).copied().ok_or_else(|| {
            SysyError::runtime_error(
                line,
                format!("index {} is out of bounds for constant '{}'", index, name),
            )
        })
    }
}

/// Insertion-ordered mapping from identifier to descriptor.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    index: FxHashMap<String, usize>,
    entries: Vec<(String, IdentMemory)>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&IdentMemory> {
        self.index.get(name).map(|&slot| &self.entries[slot].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut IdentMemory> {
        match self.index.get(name) {
            Some(&slot) => Some(&mut self.entries[slot].1),
            None => None,
        }
    }

    /// Binds `name`, replacing an existing binding in place.
    pub fn insert(&mut self, name: &str, memory: IdentMemory) -> &mut IdentMemory {
        let slot = match self.index.get(name) {
            Some(&slot) => {
                self.entries[slot].1 = memory;
                slot
            }
            None => {
                self.entries.push((name.to_string(), memory));
                self.index.insert(name.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[slot].1
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(slot) = self.index.remove(name) {
            self.entries.remove(slot);
            for other in self.index.values_mut() {
                if *other > slot {
                    *other -= 1;
                }
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    /// Index of the first scope of each active call, innermost last.
    frames: Vec<usize>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
            frames: Vec::new(),
        }
    }

    fn frame_base(&self) -> usize {
        self.frames.last().copied().unwrap_or(1)
    }

    /// Visible scopes from innermost to outermost: the current frame's
    /// scopes, then the global scope.
    fn visible(&self) -> impl Iterator<Item = usize> {
        let base = self.frame_base().min(self.scopes.len());
        (base..self.scopes.len()).rev().chain(std::iter::once(0))
    }

    pub fn search(&self, name: &str) -> Option<&IdentMemory> {
        self.visible().find_map(|index| self.scopes[index].get(name))
    }

    pub fn search_mut(&mut self, name: &str) -> Option<&mut IdentMemory> {
        let index = self
            .visible()
            .find(|&index| self.scopes[index].get(name).is_some())?;
        self.scopes[index].get_mut(name)
    }

    pub fn search_current_scope(&self, name: &str) -> Option<&IdentMemory> {
        self.current().get(name)
    }

    pub fn add_symbol(&mut self, name: &str, memory: IdentMemory) -> &mut IdentMemory {
        self.current_mut().insert(name, memory)
    }

    pub fn add_global_symbol(&mut self, name: &str, memory: IdentMemory) -> &mut IdentMemory {
        self.scopes[0].insert(name, memory)
    }

    /// Removes `name` from the current scope; absent names are ignored.
    pub fn delete(&mut self, name: &str) {
        self.current_mut().remove(name);
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn exit_scope(&mut self) {
        let floor = self.frames.last().map_or(1, |&base| base + 1);
        if self.scopes.len() > floor {
            self.scopes.pop();
        }
    }

    /// Starts a call: hides the caller's locals and opens the callee's
    /// outermost scope.
    pub fn push_frame(&mut self) {
        self.frames.push(self.scopes.len());
        self.scopes.push(Scope::new());
    }

    pub fn pop_frame(&mut self) {
        if let Some(base) = self.frames.pop() {
            self.scopes.truncate(base.max(1));
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn global_scope(&self) -> &Scope {
        &self.scopes[0]
    }

    fn current(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}
