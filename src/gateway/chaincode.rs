// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Car Registry Contract
//!
//! Transaction functions of the car registry, executed against a
//! [`WorldState`]. Cars and persons share one key space, as on the network:
//! persons are keyed `"1"`, `"2"`, ..., cars `"101"`, `"102"`, ...
//!
//! | Function | Arguments | Returns |
//! |----------|-----------|---------|
//! | `InitLedger` | - | - |
//! | `ChangeColor` | id, color | - |
//! | `RepairFailure` | id, failure id | - |
//! | `TransferOwnership` | id, acceptFailures, newOwner | - |
//! | `CreateFailure` | id, failureID, desc, price | - |
//! | `AssetExists` | id | `true` / `false` |
//! | `GetAllCarsByColor` | color | JSON array of cars |
//! | `GetAllCarsByColorAndOwner` | color, owner | JSON array of cars |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const INIT_LEDGER: &str = "InitLedger";
pub const CHANGE_COLOR: &str = "ChangeColor";
pub const REPAIR_FAILURE: &str = "RepairFailure";
pub const TRANSFER_OWNERSHIP: &str = "TransferOwnership";
pub const CREATE_FAILURE: &str = "CreateFailure";
pub const ASSET_EXISTS: &str = "AssetExists";
pub const GET_ALL_CARS_BY_COLOR: &str = "GetAllCarsByColor";
pub const GET_ALL_CARS_BY_COLOR_AND_OWNER: &str = "GetAllCarsByColorAndOwner";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    #[serde(rename = "ID")]
    pub id: String,
    pub description: String,
    pub price: f64,
    pub repaired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    #[serde(rename = "ID")]
    pub id: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    #[serde(rename = "ownerID")]
    pub owner_id: String,
    pub failures: Vec<Failure>,
    pub price: f64,
}

impl Car {
    fn unrepaired(&self) -> impl Iterator<Item = &Failure> {
        self.failures.iter().filter(|failure| !failure.repaired)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    Car(Car),
    Person(Person),
}

/// Errors returned by transaction functions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChaincodeError {
    #[error("function {0} not found in contract")]
    UnknownFunction(String),

    #[error("{function}: expected {expected} arguments, got {actual}")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("{function}: cannot parse argument {position} (`{value}`) as {expected}")]
    InvalidArgument {
        function: String,
        position: usize,
        value: String,
        expected: &'static str,
    },

    #[error("{0}")]
    Rejected(String),
}

/// Key/value world state, iterated in key order like a range query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldState {
    assets: BTreeMap<String, Asset>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    pub fn put_car(&mut self, car: Car) {
        self.assets.insert(car.id.clone(), Asset::Car(car));
    }

    pub fn put_person(&mut self, person: Person) {
        self.assets.insert(person.id.clone(), Asset::Person(person));
    }

    pub fn car(&self, id: &str) -> Option<&Car> {
        match self.assets.get(id) {
            Some(Asset::Car(car)) => Some(car),
            _ => None,
        }
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        match self.assets.get(id) {
            Some(Asset::Person(person)) => Some(person),
            _ => None,
        }
    }

    fn require_car(&self, id: &str) -> Result<Car, ChaincodeError> {
        self.car(id)
            .cloned()
            .ok_or_else(|| ChaincodeError::Rejected(format!("the car {id} does not exist")))
    }

    fn require_person(&self, id: &str) -> Result<Person, ChaincodeError> {
        self.person(id)
            .cloned()
            .ok_or_else(|| ChaincodeError::Rejected(format!("the person {id} does not exist")))
    }

    fn cars(&self) -> impl Iterator<Item = &Car> {
        self.assets.values().filter_map(|asset| match asset {
            Asset::Car(car) => Some(car),
            Asset::Person(_) => None,
        })
    }
}

/// Persons and cars written by `InitLedger`.
pub fn seed_state() -> WorldState {
    let mut state = WorldState::new();
    let persons = [
        ("1", "Pero", "Peric", "pero.peric@maildrop.cc", 100.0),
        ("2", "Milos", "Vucic", "milos.vucic@maildrop.cc", 150.0),
        ("3", "Edo", "Teka", "edo.teka@maildrop.cc", 200.0),
    ];
    for (id, name, surname, email, balance) in persons {
        state.put_person(Person {
            id: id.into(),
            name: name.into(),
            surname: surname.into(),
            email: email.into(),
            balance,
        });
    }

    let cars = [
        ("101", "Mercedes", "C", 2021, "siva", "1", 150.0),
        ("102", "BMW", "250", 2019, "crna", "1", 150.0),
        ("103", "Toyota", "Hybrid", 2017, "plava", "2", 50.0),
        ("104", "Opel", "Astra C", 2010, "siva", "2", 50.0),
        ("105", "Audi", "R8", 2013, "bela", "3", 200.0),
        ("106", "Volkswagen", "Golf 7", 2015, "crvena", "3", 100.0),
    ];
    for (id, brand, model, year, color, owner_id, price) in cars {
        state.put_car(Car {
            id: id.into(),
            brand: brand.into(),
            model: model.into(),
            year,
            color: color.into(),
            owner_id: owner_id.into(),
            failures: Vec::new(),
            price,
        });
    }
    state
}

/// Run `function` against `state`, returning its payload.
///
/// On error `state` may be partially written; callers run transactions on a
/// copy and keep it only on success.
pub fn invoke(
    state: &mut WorldState,
    function: &str,
    args: &[String],
) -> Result<Vec<u8>, ChaincodeError> {
    let call = Call { function, args };
    match function {
        INIT_LEDGER => {
            call.arity(0)?;
            init_ledger(state)
        }
        CHANGE_COLOR => {
            call.arity(2)?;
            change_color(state, &args[0], &args[1])
        }
        REPAIR_FAILURE => {
            call.arity(2)?;
            repair_failure(state, &args[0], &args[1])
        }
        TRANSFER_OWNERSHIP => {
            call.arity(3)?;
            let accept_failures = call.boolean(1)?;
            transfer_ownership(state, &args[0], accept_failures, &args[2])
        }
        CREATE_FAILURE => {
            call.arity(4)?;
            let price = call.float(3)?;
            create_failure(state, &args[0], &args[1], &args[2], price)
        }
        ASSET_EXISTS => {
            call.arity(1)?;
            Ok(state.contains(&args[0]).to_string().into_bytes())
        }
        GET_ALL_CARS_BY_COLOR => {
            call.arity(1)?;
            cars_json(state.cars().filter(|car| car.color == args[0]))
        }
        GET_ALL_CARS_BY_COLOR_AND_OWNER => {
            call.arity(2)?;
            cars_json(
                state
                    .cars()
                    .filter(|car| car.color == args[0] && car.owner_id == args[1]),
            )
        }
        other => Err(ChaincodeError::UnknownFunction(other.to_string())),
    }
}

struct Call<'a> {
    function: &'a str,
    args: &'a [String],
}

impl Call<'_> {
    fn arity(&self, expected: usize) -> Result<(), ChaincodeError> {
        if self.args.len() == expected {
            Ok(())
        } else {
            Err(ChaincodeError::Arity {
                function: self.function.to_string(),
                expected,
                actual: self.args.len(),
            })
        }
    }

    fn invalid(&self, position: usize, expected: &'static str) -> ChaincodeError {
        ChaincodeError::InvalidArgument {
            function: self.function.to_string(),
            position,
            value: self.args[position].clone(),
            expected,
        }
    }

    fn boolean(&self, position: usize) -> Result<bool, ChaincodeError> {
        match self.args[position].as_str() {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err(self.invalid(position, "bool")),
        }
    }

    fn float(&self, position: usize) -> Result<f64, ChaincodeError> {
        self.args[position]
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| self.invalid(position, "float64"))
    }
}

fn cars_json<'a>(cars: impl Iterator<Item = &'a Car>) -> Result<Vec<u8>, ChaincodeError> {
    let cars: Vec<&Car> = cars.collect();
    serde_json::to_vec(&cars).map_err(|e| ChaincodeError::Rejected(e.to_string()))
}

fn init_ledger(state: &mut WorldState) -> Result<Vec<u8>, ChaincodeError> {
    if !state.is_empty() {
        return Err(ChaincodeError::Rejected(
            "the ledger is already initialized".to_string(),
        ));
    }
    *state = seed_state();
    Ok(Vec::new())
}

fn change_color(state: &mut WorldState, id: &str, color: &str) -> Result<Vec<u8>, ChaincodeError> {
    let mut car = state.require_car(id)?;
    car.color = color.to_string();
    state.put_car(car);
    Ok(Vec::new())
}

/// Marks the failure repaired and charges the owner. Unknown failure ids
/// leave the car untouched.
fn repair_failure(
    state: &mut WorldState,
    id: &str,
    failure_id: &str,
) -> Result<Vec<u8>, ChaincodeError> {
    let mut car = state.require_car(id)?;
    let mut owner = state.require_person(&car.owner_id)?;

    if let Some(failure) = car.failures.iter_mut().find(|f| f.id == failure_id) {
        failure.repaired = true;
        owner.balance -= failure.price;
    }

    state.put_person(owner);
    state.put_car(car);
    Ok(Vec::new())
}

/// Sells the car to `new_owner`. With unrepaired failures the sale needs
/// `accept_failures`, and the price drops by the cost of those failures.
fn transfer_ownership(
    state: &mut WorldState,
    id: &str,
    accept_failures: bool,
    new_owner: &str,
) -> Result<Vec<u8>, ChaincodeError> {
    let mut car = state.require_car(id)?;
    if car.owner_id == new_owner {
        return Err(ChaincodeError::Rejected(
            "this is your car, you can't buy it".to_string(),
        ));
    }

    let has_failures = car.unrepaired().next().is_some();
    if has_failures && !accept_failures {
        return Err(ChaincodeError::Rejected("car has failures".to_string()));
    }

    let mut seller = state.require_person(&car.owner_id)?;
    let mut buyer = state.require_person(new_owner)?;

    let price = car.price - car.unrepaired().map(|f| f.price).sum::<f64>();
    if buyer.balance < price {
        return Err(ChaincodeError::Rejected(format!(
            "the person {new_owner} does not have enough money"
        )));
    }

    car.owner_id = new_owner.to_string();
    buyer.balance -= price;
    seller.balance += price;

    state.put_person(buyer);
    state.put_person(seller);
    state.put_car(car);
    Ok(Vec::new())
}

/// Records a failure; a car whose unrepaired failures reach its price is
/// written off and removed from the ledger.
fn create_failure(
    state: &mut WorldState,
    id: &str,
    failure_id: &str,
    description: &str,
    price: f64,
) -> Result<Vec<u8>, ChaincodeError> {
    let mut car = state.require_car(id)?;

    let total = car.unrepaired().map(|f| f.price).sum::<f64>() + price;
    if total >= car.price {
        state.assets.remove(id);
        return Ok(Vec::new());
    }

    car.failures.push(Failure {
        id: failure_id.to_string(),
        description: description.to_string(),
        price,
        repaired: false,
    });
    state.put_car(car);
    Ok(Vec::new())
}
