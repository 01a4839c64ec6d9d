#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, bail};
use rigstack_core::host::{ensure_node, ConventionNamer, MemoryScene, NameService};
use rigstack_core::{
    AttributeSet, BuildConfig, BuildContext, Component, ComponentId, ComponentRegistry,
    ComponentRequest, FailurePolicy, Stack, Value,
};

/// Shared state the fixture components report into.
#[derive(Clone, Default)]
pub struct Harness {
    pub journal: Rc<RefCell<Vec<String>>>,
    pub scene: Rc<RefCell<MemoryScene>>,
    pub namer: Rc<ConventionNamer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self, event: String) {
        self.journal.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    /// Labels of components whose `run` was entered, in call order.
    pub fn runs(&self) -> Vec<String> {
        self.journal
            .borrow()
            .iter()
            .filter_map(|e| e.strip_prefix("run:").map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.journal.borrow_mut().clear();
    }

    /// Native builders that definition files refer to.
    pub fn install_builders(&self, registry: &mut ComponentRegistry) {
        let h = self.clone();
        registry.register_builder("probe", move || Box::new(Probe { h: h.clone() }));
        let h = self.clone();
        registry.register_builder("gated", move || Box::new(Gated { h: h.clone() }));
        let h = self.clone();
        registry.register_builder("rig_root", move || Box::new(RigRoot { h: h.clone() }));
        let h = self.clone();
        registry.register_builder("joint_chain", move || Box::new(JointChain::new(&h)));
    }

    /// Builders only; nothing registered.
    pub fn empty_registry(&self) -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        self.install_builders(&mut registry);
        registry
    }

    /// Every fixture component registered in code at version 1.
    pub fn registry(&self) -> ComponentRegistry {
        let mut registry = self.empty_registry();
        let h = self.clone();
        registry.register("probe", 1, move || Box::new(Probe { h: h.clone() }));
        let h = self.clone();
        registry.register("gated", 1, move || Box::new(Gated { h: h.clone() }));
        let h = self.clone();
        registry.register("rig_root", 1, move || Box::new(RigRoot { h: h.clone() }));
        let h = self.clone();
        registry.register("joint_chain", 1, move || Box::new(JointChain::new(&h)));
        registry
    }

    pub fn stack(&self) -> Stack {
        Stack::new(self.registry())
    }

    pub fn stack_with(&self, policy: FailurePolicy) -> Stack {
        let config = BuildConfig {
            failure_policy: policy,
            ..BuildConfig::default()
        };
        Stack::with_config(self.registry(), config)
    }
}

pub fn probe(stack: &mut Stack, label: &str, parent: Option<ComponentId>) -> ComponentId {
    let mut request = ComponentRequest::new("probe", label);
    request.parent = parent;
    stack.add_component(request).unwrap()
}

/// Journals every hook. Options `valid`, `fail`, `falsy` and `panic` steer the outcome.
pub struct Probe {
    h: Harness,
}

impl Component for Probe {
    fn declare(&self, attributes: &mut AttributeSet) {
        attributes.declare_option("valid", true);
        attributes.declare_option("fail", false);
        attributes.declare_option("falsy", false);
        attributes.declare_option("panic", false);
        attributes.declare_option("side", "C").with_should_inherit(true);
        attributes
            .declare_requirement("input", Value::Null)
            .with_description("copied to `value` when set");
        attributes.declare_output("value");
    }

    fn on_enter_stack(&mut self, stack: &mut Stack, id: ComponentId) -> anyhow::Result<()> {
        let label = stack
            .component(id)
            .map(|node| node.label().to_string())
            .unwrap_or_default();
        self.h.log(format!("enter:{label}"));
        Ok(())
    }

    fn is_valid(&self, ctx: &BuildContext<'_>) -> bool {
        ctx.option("valid").and_then(|v| v.as_bool()) != Some(false)
    }

    fn run(&mut self, ctx: &mut BuildContext<'_>) -> anyhow::Result<bool> {
        let label = ctx.label().to_string();
        self.h.log(format!("run:{label}"));
        let flag = |name: &str| ctx.option(name).and_then(|v| v.as_bool()) == Some(true);
        if flag("panic") {
            panic!("probe {label} exploded");
        }
        if flag("fail") {
            bail!("probe {label} was told to fail");
        }
        if flag("falsy") {
            return Ok(false);
        }
        let value = ctx
            .requirement("input")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| Value::text(label.as_str()));
        ctx.set_output("value", value)?;
        Ok(true)
    }

    fn on_build_finished(&mut self, ctx: &mut BuildContext<'_>, successful: bool) {
        self.h.log(format!("finished:{}:{}", ctx.label(), successful));
    }
}

/// One required `source`; copies its dereferenced value to `copy`.
pub struct Gated {
    h: Harness,
}

impl Component for Gated {
    fn declare(&self, attributes: &mut AttributeSet) {
        attributes
            .declare_requirement("source", Value::Null)
            .with_validate(true);
        attributes.declare_output("copy");
    }

    fn run(&mut self, ctx: &mut BuildContext<'_>) -> anyhow::Result<bool> {
        self.h.log(format!("run:{}", ctx.label()));
        let source = ctx.requirement("source").unwrap_or_default();
        ctx.set_output("copy", source)?;
        Ok(true)
    }
}

/// Top-level rig group. Adds a guide probe the first time it joins a stack.
pub struct RigRoot {
    h: Harness,
}

impl Component for RigRoot {
    fn declare(&self, attributes: &mut AttributeSet) {
        attributes.declare_option("side", "C").with_should_inherit(true);
        attributes.declare_output("root_node");
    }

    fn on_enter_stack(&mut self, stack: &mut Stack, id: ComponentId) -> anyhow::Result<()> {
        let label = stack
            .component(id)
            .map(|node| node.label().to_string())
            .ok_or_else(|| anyhow!("rig root {id} is not in the stack"))?;
        self.h.log(format!("enter:{label}"));
        stack.add_component(ComponentRequest::new("probe", format!("{label}_guide")).parent(id))?;
        Ok(())
    }

    fn run(&mut self, ctx: &mut BuildContext<'_>) -> anyhow::Result<bool> {
        self.h.log(format!("run:{}", ctx.label()));
        let name = self.h.namer.generate_name("grp", ctx.label(), None, false);
        ensure_node(&mut *self.h.scene.borrow_mut(), &name, None)?;
        ctx.set_output("root_node", name)?;
        Ok(true)
    }
}

/// FK chain of `joint_count` joints under `parent_joint`.
pub struct JointChain {
    h: Harness,
    default_count: i32,
}

impl JointChain {
    pub fn new(h: &Harness) -> Self {
        Self::tagged(h, 1)
    }

    /// A chain whose declared `joint_count` default is `default_count`.
    pub fn tagged(h: &Harness, default_count: i32) -> Self {
        Self {
            h: h.clone(),
            default_count,
        }
    }
}

impl Component for JointChain {
    fn declare(&self, attributes: &mut AttributeSet) {
        attributes.declare_option("joint_count", self.default_count);
        attributes.declare_option("side", "C").with_should_inherit(true);
        attributes
            .declare_requirement("parent_joint", "")
            .with_validate(true);
        attributes.declare_output("joints");
        attributes.declare_output("end_joint");
    }

    fn is_valid(&self, ctx: &BuildContext<'_>) -> bool {
        ctx.option("joint_count")
            .and_then(|v| v.as_i64())
            .is_some_and(|n| n >= 1)
    }

    fn run(&mut self, ctx: &mut BuildContext<'_>) -> anyhow::Result<bool> {
        let label = ctx.label().to_string();
        self.h.log(format!("run:{label}"));
        let parent = ctx
            .requirement("parent_joint")
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| anyhow!("parent_joint of {label} is not a node name"))?;
        let count = ctx
            .option("joint_count")
            .and_then(|v| v.as_i64())
            .unwrap_or(1);
        let side = ctx
            .option("side")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "C".to_string());

        let mut joints = Vec::new();
        let mut previous = parent;
        {
            let mut scene = self.h.scene.borrow_mut();
            for i in 0..count {
                let name =
                    self.h
                        .namer
                        .generate_name("jnt", &format!("{label}{i}"), Some(&side), false);
                ensure_node(&mut *scene, &name, Some(&previous))?;
                joints.push(Value::text(name.as_str()));
                previous = name;
            }
        }
        ctx.set_output("joints", joints)?;
        ctx.set_output("end_joint", previous)?;
        Ok(true)
    }
}
