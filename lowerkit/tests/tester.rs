extern crate lowerkit;

use indoc::indoc;
use lowerkit::tester::Tester;
use std::panic::Location;

#[test]
fn check_lines_contain_skips_extra_lines() {
    let actual = indoc! {"
    module {
      vm.module @module {
        %0 = vm.const.i32 1 : i32
        vm.return %0 : i32
      }
    }
    "};
    let expected = indoc! {"
    vm.module @module {

      vm.return %0 : i32
    "};
    Tester::check_lines_contain(actual, expected, Location::caller());
}

#[test]
#[should_panic(expected = "<== missing")]
fn check_lines_contain_requires_order() {
    let actual = indoc! {"
    %0 = vm.const.i32 1 : i32
    vm.return %0 : i32
    "};
    let expected = indoc! {"
    vm.return %0 : i32
    %0 = vm.const.i32 1 : i32
    "};
    Tester::check_lines_contain(actual, expected, Location::caller());
}

#[test]
#[should_panic]
fn check_lines_exact_compares_indentation() {
    let actual = "module {\n  vm.return\n}";
    let expected = "module {\nvm.return\n}";
    Tester::check_lines_exact(actual, expected, Location::caller());
}

#[test]
#[should_panic(expected = "Expected changes")]
fn transform_without_changes_panics() {
    Tester::init_tracing();
    let src = "module {\n}";
    Tester::transform(vec!["--convert-std-to-vm"], src);
}
