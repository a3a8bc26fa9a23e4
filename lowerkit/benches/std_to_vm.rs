extern crate lowerkit;

use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use indoc::indoc;
use lowerkit::tester::Tester;
use std::panic::Location;

fn flags() -> Vec<&'static str> {
    vec!["--convert-std-to-vm"]
}

fn module_with_functions(n: usize) -> String {
    let mut src = String::from("module {\n  module @bench {\n");
    for i in 0..n {
        src.push_str(&format!(
            indoc! {"
            func.func @add_one_{}(%arg0 : i32) -> i32 attributes {{iree.module.export}} {{
              %c1 = arith.constant 1 : i32
              %0 = arith.addi %c1, %arg0 : i32
              return %0 : i32
            }}
            "},
            i
        ));
    }
    src.push_str("  }\n}\n");
    src
}

fn benchmark_rewrite() {
    Tester::init_tracing();
    let src = module_with_functions(100);
    let expected = indoc! {"
    vm.func @add_one_99(%arg0 : i32) -> i32 {
      %c1 = vm.const.i32 1 : i32
      %0 = vm.add.i32 %c1, %arg0 : i32
      vm.return %0 : i32
    }
    vm.export @add_one_99
    "};
    let (module, actual) = Tester::transform(flags(), &src);
    Tester::verify(module);
    Tester::check_lines_contain(&actual, expected, Location::caller());
}

fn bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");
    group.sample_size(10);
    group.bench_function("std_to_vm", |b| b.iter(benchmark_rewrite));
    group.finish();
}

criterion_group!(benches, bench);
criterion_main!(benches);
