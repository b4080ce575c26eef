//! End-to-end verification scenarios over the textual surface syntax.

use topt::{parse, VerifyOpts};

fn verify(text: &str) -> Vec<String> {
    verify_with(text, &VerifyOpts::default())
}

fn verify_with(text: &str, opts: &VerifyOpts) -> Vec<String> {
    let mut ts = parse(text).expect("parse");
    assert_eq!(ts.len(), 1);
    let errs = ts.remove(0).verify(opts);
    errs.iter().map(str::to_string).collect()
}

#[test]
fn identity_add() {
    let errs = verify("%r = add i8 %x, %y\nret i8 %r\n=>\n%r = add i8 %x, %y\nret i8 %r\n");
    assert!(errs.is_empty(), "{errs:?}");
}

#[test]
fn add_is_commutative() {
    let errs = verify("%r = add i8 %x, %y\nret i8 %r\n=>\n%r = add i8 %y, %x\nret i8 %r\n");
    assert!(errs.is_empty(), "{errs:?}");
}

#[test]
fn dropping_nsw_is_allowed() {
    // the target may be less poisonous than the source
    let errs = verify("%r = add nsw i8 %x, 1\nret i8 %r\n=>\n%r = add i8 %x, 1\nret i8 %r\n");
    assert!(errs.is_empty(), "{errs:?}");
}

#[test]
fn adding_nsw_is_flagged() {
    let errs = verify("%r = add i8 %x, 1\nret i8 %r\n=>\n%r = add nsw i8 %x, 1\nret i8 %r\n");
    assert_eq!(errs, vec!["Target is more poisonous than source"]);
}

#[test]
fn sdiv_is_not_udiv() {
    let errs = verify("%r = sdiv i8 %x, %y\nret i8 %r\n=>\n%r = udiv i8 %x, %y\nret i8 %r\n");
    assert_eq!(errs, vec!["Value mismatch"]);
}

#[test]
fn mul_by_two_is_shl_by_one() {
    let errs = verify("%r = mul i8 %x, 2\nret i8 %r\n=>\n%r = shl i8 %x, 1\nret i8 %r\n");
    assert!(errs.is_empty(), "{errs:?}");
}

#[test]
fn return_to_unreachable_narrows_the_domain() {
    let errs = verify("ret i8 0\n=>\nunreachable\n");
    assert_eq!(errs, vec!["Source is more defined than target"]);
}

#[test]
fn unreachable_to_return_widens_the_domain() {
    let errs = verify("unreachable\n=>\nret i8 0\n");
    assert_eq!(errs, vec!["Target returns but source doesn't"]);
}

#[test]
fn udiv_narrowing_the_domain_is_flagged() {
    // a target that divides by zero where the source does not is less
    // defined; the value query runs independently and may fire as well
    let errs = verify("%r = add i8 %x, 0\nret i8 %r\n=>\n%r = udiv i8 %x, 0\nret i8 %r\n");
    assert_eq!(errs[0], "Source is more defined than target");
}

#[test]
fn dropping_a_division_widens_the_domain() {
    // x/y is defined only for y != 0; returning x unconditionally refines
    // nothing about the value on the surviving paths, but the domain only
    // grows, which is allowed
    let errs = verify(
        "%q = udiv i8 %x, %y\n%r = mul i8 %q, %y\n%s = sub i8 %x, %x\nret i8 %s\n=>\n%s = sub i8 %x, %x\nret i8 %s\n",
    );
    assert!(errs.is_empty(), "{errs:?}");
}

#[test]
fn symbolic_widths_verify_under_a_solved_typing() {
    // no width annotations: the solver picks the typing
    let errs = verify_with(
        "%r = add %x, %y\nret %r\n=>\n%r = add %y, %x\nret %r\n",
        &VerifyOpts {
            single_typing: true,
            ..VerifyOpts::default()
        },
    );
    assert!(errs.is_empty(), "{errs:?}");
}

#[test]
fn untypeable_pair_reports_once() {
    let errs = verify("%r = add i8 %x, %y\nret i16 %r\n=>\nret i16 %x\n");
    assert_eq!(errs, vec!["Doesn't type check"]);
}

#[test]
fn sub_zero_identity() {
    let errs = verify("%r = sub i8 %x, 0\nret i8 %r\n=>\nret i8 %x\n");
    assert!(errs.is_empty(), "{errs:?}");
}

#[test]
fn wrong_constant_fold_is_a_value_mismatch() {
    let errs = verify("%r = add i8 %x, 1\nret i8 %r\n=>\n%r = add i8 %x, 2\nret i8 %r\n");
    assert_eq!(errs, vec!["Value mismatch"]);
}

#[test]
fn exact_udiv_shl_cancellation() {
    // (x /u 2 exact) * 2 == x on every non-poison path
    let errs = verify(
        "%q = udiv exact i8 %x, 2\n%r = mul i8 %q, 2\nret i8 %r\n=>\nret i8 %x\n",
    );
    assert!(errs.is_empty(), "{errs:?}");
}

#[test]
fn shl_into_oversized_shift_loses_definedness() {
    let errs = verify("%r = add i8 %x, 0\nret i8 %r\n=>\n%r = shl i8 %x, 8\nret i8 %r\n");
    assert_eq!(errs[0], "Source is more defined than target");
}
