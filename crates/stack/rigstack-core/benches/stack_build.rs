//! Full and partial build passes over generated rigs.
//!
//! Run with: cargo bench --bench stack_build

use std::cell::RefCell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rigstack_core::host::{ensure_node, MemoryScene};
use rigstack_core::{
    AttributeCategory, AttributeSet, BuildContext, Component, ComponentId, ComponentRegistry,
    ComponentRequest, Stack, Value,
};

/// One scene node per component, parented under whatever `parent_node` resolves to.
struct Segment {
    scene: Rc<RefCell<MemoryScene>>,
}

impl Component for Segment {
    fn declare(&self, attributes: &mut AttributeSet) {
        attributes.declare_option("side", "C").with_should_inherit(true);
        attributes.declare_requirement("parent_node", Value::Null);
        attributes.declare_output("node");
    }

    fn run(&mut self, ctx: &mut BuildContext<'_>) -> anyhow::Result<bool> {
        let name = format!("{}_node", ctx.label());
        let parent = ctx
            .requirement("parent_node")
            .and_then(|v| v.as_str().map(str::to_string));
        ensure_node(&mut *self.scene.borrow_mut(), &name, parent.as_deref())?;
        ctx.set_output("node", name)?;
        Ok(true)
    }
}

/// `branches` roots, each a chain `depth` components deep, each link reading the previous
/// link's output through an address.
fn build_rig(branches: usize, depth: usize) -> (Stack, Vec<ComponentId>) {
    let scene = Rc::new(RefCell::new(MemoryScene::new()));
    let mut registry = ComponentRegistry::new();
    registry.register("segment", 1, move || {
        Box::new(Segment {
            scene: scene.clone(),
        })
    });

    let mut stack = Stack::new(registry);
    let mut roots = Vec::with_capacity(branches);
    for b in 0..branches {
        let mut parent: Option<ComponentId> = None;
        for d in 0..depth {
            let label = format!("b{b}_s{d}");
            let mut request = ComponentRequest::new("segment", label.as_str());
            if let Some(p) = parent {
                let address = stack
                    .address_of(p, AttributeCategory::Output, "node")
                    .expect("parent output is declared");
                request = request.parent(p).requirement("parent_node", address);
            }
            let id = stack.add_component(request).expect("segment registered");
            if parent.is_none() {
                roots.push(id);
            }
            parent = Some(id);
        }
    }
    (stack, roots)
}

fn bench_full_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack_build_full");
    for (branches, depth) in [(4, 8), (16, 16), (32, 32)] {
        let (mut stack, _) = build_rig(branches, depth);
        group.throughput(Throughput::Elements(stack.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{branches}x{depth}")),
            &(),
            |b, _| b.iter(|| black_box(stack.build(None))),
        );
    }
    group.finish();
}

fn bench_partial_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack_build_partial");
    let (mut stack, roots) = build_rig(32, 32);
    stack.build(None);
    let target = roots[roots.len() / 2];
    group.throughput(Throughput::Elements((stack.descendants(target).len() + 1) as u64));
    group.bench_function("one_branch_of_32", |b| {
        b.iter(|| black_box(stack.build(Some(target))))
    });
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let (stack, _) = build_rig(16, 16);
    c.bench_function("stack_snapshot_16x16", |b| {
        b.iter(|| black_box(stack.snapshot().to_json_string()))
    });
}

criterion_group!(benches, bench_full_build, bench_partial_build, bench_snapshot);
criterion_main!(benches);
