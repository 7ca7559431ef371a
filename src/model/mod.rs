//! Backend-neutral 0/1 linear model of the timetable.
//!
//! Rows are kept as plain `expression (<= | ==) 0` records instead of
//! `good_lp` constraints so the same model can be handed to the backend more
//! than once (lexicographic mode solves it twice) and so returned values can
//! be checked against it.

pub mod hard;
pub mod soft;
pub mod variables;

use good_lp::{
    Expression, ProblemVariables, Solution, Variable, VariableDefinition, constraint, variable,
};
use log::{info, trace};

use crate::config::OptimizationWeights;
use crate::data::ModelSize;
use crate::problem::Problem;

pub use soft::SoftTerms;
pub use variables::VariableIndex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Binary,
    Continuous { min: f64, max: f64 },
}

impl VarKind {
    pub fn definition(self) -> VariableDefinition {
        match self {
            VarKind::Binary => variable().binary(),
            VarKind::Continuous { min, max } => variable().min(min).max(max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessOrEqual,
    Equal,
}

/// `expression <= 0` or `expression == 0`.
#[derive(Debug, Clone)]
pub struct Row {
    pub expression: Expression,
    pub relation: Relation,
}

impl Row {
    pub fn to_constraint(&self) -> good_lp::Constraint {
        let lhs = self.expression.clone();
        match self.relation {
            Relation::LessOrEqual => constraint!(lhs <= 0.0),
            Relation::Equal => constraint!(lhs == 0.0),
        }
    }

    pub fn is_satisfied<S: Solution>(&self, values: &S, tolerance: f64) -> bool {
        let lhs = self.expression.eval_with(values);
        match self.relation {
            Relation::LessOrEqual => lhs <= tolerance,
            Relation::Equal => lhs.abs() <= tolerance,
        }
    }
}

#[derive(Default)]
pub struct TimetableModel {
    problem_vars: ProblemVariables,
    variables: Vec<(Variable, VarKind)>,
    binary_count: usize,
    rows: Vec<Row>,
}

impl TimetableModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, kind: VarKind) -> Variable {
        let var = self.problem_vars.add(kind.definition());
        if kind == VarKind::Binary {
            self.binary_count += 1;
        }
        self.variables.push((var, kind));
        var
    }

    pub fn add_binary(&mut self) -> Variable {
        self.add(VarKind::Binary)
    }

    /// A continuous variable in `[0, 1]`, used for auxiliaries whose rows
    /// force integral values whenever their inputs are integral.
    pub fn add_unit(&mut self) -> Variable {
        self.add(VarKind::Continuous { min: 0.0, max: 1.0 })
    }

    pub fn add_continuous(&mut self, min: f64, max: f64) -> Variable {
        self.add(VarKind::Continuous { min, max })
    }

    pub fn leq(&mut self, lhs: impl Into<Expression>, rhs: impl Into<Expression>) {
        let mut expression = lhs.into();
        expression -= rhs.into();
        self.rows.push(Row {
            expression,
            relation: Relation::LessOrEqual,
        });
    }

    pub fn geq(&mut self, lhs: impl Into<Expression>, rhs: impl Into<Expression>) {
        self.leq(rhs, lhs);
    }

    pub fn eq(&mut self, lhs: impl Into<Expression>, rhs: impl Into<Expression>) {
        let mut expression = lhs.into();
        expression -= rhs.into();
        self.rows.push(Row {
            expression,
            relation: Relation::Equal,
        });
    }

    pub fn fix_zero(&mut self, var: Variable) {
        self.eq(var, 0.0);
    }

    /// `target == OR(inputs)` for 0/1 inputs; no inputs pins the target to 0.
    pub fn require_or(&mut self, target: Variable, inputs: &[Expression]) {
        if inputs.is_empty() {
            self.fix_zero(target);
            return;
        }
        for input in inputs {
            self.geq(target, input.clone());
        }
        self.leq(target, inputs.iter().cloned().sum::<Expression>());
    }

    /// `target == a AND b` for 0/1 inputs.
    pub fn require_and(&mut self, target: Variable, a: Expression, b: Expression) {
        self.leq(target, a.clone());
        self.leq(target, b.clone());
        let mut lower = a + b;
        lower -= 1.0;
        self.geq(target, lower);
    }

    pub fn at_most_one(&mut self, vars: &[Variable]) {
        if vars.len() > 1 {
            self.leq(vars.iter().copied().sum::<Expression>(), 1.0);
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn variables(&self) -> &[(Variable, VarKind)] {
        &self.variables
    }

    pub fn binaries(&self) -> impl Iterator<Item = Variable> + '_ {
        self.variables
            .iter()
            .filter(|(_, kind)| *kind == VarKind::Binary)
            .map(|(v, _)| *v)
    }

    pub fn size(&self) -> ModelSize {
        ModelSize {
            variables: self.variables.len(),
            binary_variables: self.binary_count,
            constraints: self.rows.len(),
        }
    }

    /// Number of rows not satisfied by `values` within `tolerance`.
    pub fn violated_rows<S: Solution>(&self, values: &S, tolerance: f64) -> usize {
        self.rows
            .iter()
            .filter(|row| !row.is_satisfied(values, tolerance))
            .count()
    }

    /// Binary variables whose value is not within `tolerance` of 0 or 1.
    pub fn fractional_binaries<S: Solution>(&self, values: &S, tolerance: f64) -> usize {
        self.binaries()
            .filter(|&v| {
                let x = values.value(v);
                (x - x.round()).abs() > tolerance
            })
            .count()
    }
}

/// Everything the solver needs: the rows, the decision variables and the
/// unweighted soft terms.
pub struct Encoding {
    pub model: TimetableModel,
    pub vars: VariableIndex,
    pub terms: SoftTerms,
}

/// Allocates variables and encodes every hard and soft rule of `problem`.
pub fn build(problem: &Problem, weights: &OptimizationWeights) -> Encoding {
    let mut model = TimetableModel::new();
    let vars = VariableIndex::allocate(problem, &mut model);
    trace!(
        "Allocated {} lesson variables for {} plan entries.",
        vars.lesson_count(),
        problem.requirements().len()
    );
    hard::encode(problem, &vars, &mut model);
    let hard_rows = model.rows().len();
    let terms = soft::compose(problem, &vars, weights, &mut model);
    let size = model.size();
    info!(
        "Model built: {} variables ({} binary), {} hard rows, {} rows in total.",
        size.variables, size.binary_variables, hard_rows, size.constraints
    );
    Encoding { model, vars, terms }
}
