use criterion::{black_box, criterion_group, criterion_main, Criterion};
use interlisp::{Interner, Lexer, LineLexer, LineState, Reader};

const FUNCTION: &str = r#"
(FOO%BAR
  [LAMBDA (L N)
    (* Walks L and sums the first N entries)
    (PROG ((TOTAL 0) (I 0))
      LP (COND
           ((OR (NULL L) (IGREATERP I N)) (RETURN TOTAL)))
         (SETQ TOTAL (IPLUS TOTAL (CAR L) 17Q))
         (SETQ L (CDR L))
         (SETQ I (ADD1 I))
         (GO LP])
"#;

fn source(copies: usize) -> String {
    let mut text = String::from("(DEFINEQ\n");
    for _ in 0..copies {
        text.push_str(FUNCTION);
    }
    text.push_str(")\n(PUTPROPS BENCH COPYRIGHT (\"Xerox\" 1986))\nSTOP\n");
    text
}

fn lexer_benchmark(c: &mut Criterion) {
    let text = source(200);

    c.bench_function("tokenize 200 functions", |b| {
        b.iter(|| {
            let mut lexer = Lexer::new(Interner::shared());
            lexer.tokens(black_box(text.as_bytes()), None).unwrap()
        })
    });
}

fn reader_benchmark(c: &mut Criterion) {
    let text = source(200);

    c.bench_function("read 200 functions", |b| {
        b.iter(|| {
            let mut reader = Reader::new(Interner::shared());
            reader.parse(black_box(text.as_bytes()), None).unwrap();
            reader.xref().len()
        })
    });
}

fn line_lexer_benchmark(c: &mut Criterion) {
    let text = source(200);
    let interner = Interner::shared();

    c.bench_function("tokenize 200 functions by line", |b| {
        b.iter(|| {
            let mut lexer = LineLexer::new(interner.clone());
            let mut state = LineState::START;
            let mut count = 0;
            for (i, line) in black_box(&text).lines().enumerate() {
                let (tokens, next) = lexer.tokenize_line(line.as_bytes(), i as u32 + 1, state);
                count += tokens.len();
                state = next;
            }
            count
        })
    });
}

criterion_group!(benches, lexer_benchmark, reader_benchmark, line_lexer_benchmark);
criterion_main!(benches);
