//! Crate-level integration and BDD tests, plus the plugin doubles shared by
//! the unit tests.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::PipelineError;
use crate::plugin::{
    Action, ActionContext, ActionOutcome, Container, CreateRequest, Creator, InventoryAction,
    LoadContext, Loader, Plugin, PluginClass, Representation,
};
use crate::session::{Session, keys};

mod end_to_end;

// ---------------------------------------------------------------------------
// Loader double
// ---------------------------------------------------------------------------

pub(crate) struct StubLoader {
    name: String,
    families: Vec<String>,
    representations: Vec<String>,
    order: i32,
    updates: bool,
}

impl StubLoader {
    pub(crate) fn new(name: &str, families: &[&str], representations: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            families: families.iter().map(|family| (*family).to_owned()).collect(),
            representations: representations.iter().map(|repr| (*repr).to_owned()).collect(),
            order: 0,
            updates: false,
        }
    }

    pub(crate) const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Lets the loader switch containers to another representation.
    pub(crate) const fn updating(mut self) -> Self {
        self.updates = true;
        self
    }
}

impl Plugin for StubLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn families(&self) -> &[String] {
        &self.families
    }
}

impl Loader for StubLoader {
    fn representations(&self) -> &[String] {
        &self.representations
    }

    fn load(
        &self,
        context: &LoadContext<'_>,
        name: &str,
        namespace: &str,
        options: &Value,
    ) -> Result<Container, PipelineError> {
        let mut container = Container::new(name, namespace, &self.name, &context.representation.id);
        if let Some(path) = context.path {
            container = container.with_data("path", path.display().to_string());
        }
        if !options.is_null() {
            container = container.with_data("options", options.clone());
        }
        Ok(container)
    }

    fn update(
        &self,
        container: &Container,
        representation: &Representation,
    ) -> Result<Container, PipelineError> {
        if !self.updates {
            return Err(PipelineError::plugin(&self.name, "update is not supported"));
        }
        let mut updated = container.clone();
        updated.representation.clone_from(&representation.id);
        Ok(updated)
    }

    fn remove(&self, _container: &Container) -> Result<(), PipelineError> {
        Ok(())
    }
}

pub(crate) fn loader_class(name: &str, families: &[&str], representations: &[&str]) -> PluginClass {
    let loader: Arc<dyn Loader> = Arc::new(StubLoader::new(name, families, representations));
    PluginClass::Loader(loader)
}

// ---------------------------------------------------------------------------
// Creator double
// ---------------------------------------------------------------------------

pub(crate) struct StubCreator {
    name: String,
    family: String,
    compatible: bool,
}

impl StubCreator {
    pub(crate) fn new(name: &str, family: &str) -> Self {
        Self {
            name: name.to_owned(),
            family: family.to_owned(),
            compatible: true,
        }
    }

    pub(crate) const fn incompatible(mut self) -> Self {
        self.compatible = false;
        self
    }
}

impl Plugin for StubCreator {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_compatible(&self, _session: &Session) -> bool {
        self.compatible
    }
}

impl Creator for StubCreator {
    fn family(&self) -> &str {
        &self.family
    }

    fn process(&self, request: &CreateRequest) -> Result<Value, PipelineError> {
        let mut data = request.data().clone();
        data.insert(String::from("creator"), Value::from(self.name.as_str()));
        Ok(Value::Object(data))
    }
}

pub(crate) fn creator_class(name: &str, family: &str) -> PluginClass {
    let creator: Arc<dyn Creator> = Arc::new(StubCreator::new(name, family));
    PluginClass::Creator(creator)
}

// ---------------------------------------------------------------------------
// Action doubles
// ---------------------------------------------------------------------------

pub(crate) struct StubAction {
    name: String,
    order: i32,
    required: Vec<&'static str>,
}

impl StubAction {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            order: 0,
            required: Vec::new(),
        }
    }

    pub(crate) const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub(crate) fn requiring(mut self, key: &'static str) -> Self {
        self.required.push(key);
        self
    }
}

impl Plugin for StubAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn is_compatible(&self, session: &Session) -> bool {
        session.missing(&self.required).is_empty()
    }
}

impl Action for StubAction {
    fn process(
        &self,
        session: &Session,
        _context: &ActionContext<'_>,
    ) -> Result<ActionOutcome, PipelineError> {
        Ok(ActionOutcome::Completed(json!({
            "action": self.name,
            "task": session.get(keys::TASK),
        })))
    }
}

pub(crate) fn action_class(name: &str) -> PluginClass {
    let action: Arc<dyn Action> = Arc::new(StubAction::new(name));
    PluginClass::Action(action)
}

pub(crate) struct FailingAction;

impl Plugin for FailingAction {
    fn name(&self) -> &str {
        "explode"
    }
}

impl Action for FailingAction {
    fn process(
        &self,
        _session: &Session,
        _context: &ActionContext<'_>,
    ) -> Result<ActionOutcome, PipelineError> {
        Err(PipelineError::plugin(self.name(), "nothing to explode"))
    }
}

// ---------------------------------------------------------------------------
// Inventory action double
// ---------------------------------------------------------------------------

pub(crate) struct StubInventoryAction {
    name: String,
    loader: String,
}

impl StubInventoryAction {
    pub(crate) fn for_loader(name: &str, loader: &str) -> Self {
        Self {
            name: name.to_owned(),
            loader: loader.to_owned(),
        }
    }
}

impl Plugin for StubInventoryAction {
    fn name(&self) -> &str {
        &self.name
    }
}

impl InventoryAction for StubInventoryAction {
    fn accepts(&self, container: &Container) -> bool {
        container.loader == self.loader
    }

    fn process(
        &self,
        _session: &Session,
        items: &[Container],
        _context: &ActionContext<'_>,
    ) -> Result<ActionOutcome, PipelineError> {
        let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
        Ok(ActionOutcome::Completed(json!(names)))
    }
}
