use criterion::{black_box, criterion_group, criterion_main, Criterion};
use verdant_core::Result;
use verdant_mcmc::{
    McmcConfig, Mcmc, NarrowExchange, NodeSlide, Operator, State, TreeScale, WideExchange,
    WilsonBalding,
};
use verdant_phylo::Tree;
use verdant_stats::Rng;

fn state(leaves: usize, seed: u64) -> State {
    let mut rng = Rng::seeded(seed);
    let taxa: Vec<String> = (0..leaves).map(|i| format!("t{i}")).collect();
    let tree = Tree::random(taxa, &mut rng).unwrap();
    State::new(tree, rng)
}

fn operators() -> Vec<Box<dyn Operator>> {
    vec![
        Box::new(NarrowExchange::new(3.0).unwrap()),
        Box::new(WideExchange::new(1.0).unwrap()),
        Box::new(WilsonBalding::new(1.0).unwrap()),
        Box::new(NodeSlide::new(3.0).unwrap()),
        Box::new(TreeScale::new(0.75, 1.0).unwrap()),
    ]
}

/// Cheap stand-in for a real likelihood: penalizes total tree height.
fn height_penalty(state: &State) -> Result<f64> {
    let tree = state.tree();
    Ok(-tree.internals().map(|n| tree.weight_of(n)).sum::<f64>())
}

fn bench_driver(c: &mut Criterion) {
    let mut group = c.benchmark_group("mcmc");

    for leaves in [16, 128] {
        group.bench_function(format!("10k_steps_{leaves}_taxa"), |b| {
            b.iter(|| {
                let mut s = state(leaves, 42);
                let config = McmcConfig {
                    iterations: 10_000,
                    burnin: 0,
                    verify_tree: false,
                };
                let mut mcmc =
                    Mcmc::new(config, vec![], operators(), Box::new(height_penalty), vec![])
                        .unwrap();
                black_box(mcmc.run(&mut s).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree");

    let tree = state(256, 7).tree().clone();
    group.bench_function("verify_256_taxa", |b| b.iter(|| black_box(&tree).verify()));
    group.bench_function("newick_256_taxa", |b| b.iter(|| black_box(&tree).newick()));

    let text = tree.newick();
    group.bench_function("parse_256_taxa", |b| {
        b.iter(|| Tree::from_newick(black_box(&text)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_driver, bench_tree);
criterion_main!(benches);
